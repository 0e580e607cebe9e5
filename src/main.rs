//! mapchat CLI — talk to the dashboard assistant from a terminal

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

use mapchat::protocol::MessageKind;
use mapchat::{ChatModel, ChatSession, SessionConfig, SessionEvent};

#[derive(Parser)]
#[command(name = "mapchat", about = "Chat client for the incident-map dashboard assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session: type questions, /reset to start over, Ctrl-D to quit
    Chat {
        /// Assistant model to talk to
        #[arg(long, default_value = "chat")]
        model: ChatModel,
        /// WebSocket base URL (overrides MAPCHAT_WS_BASE_URL)
        #[arg(long)]
        url: Option<String>,
    },
    /// Send a single question and print the reply
    Send {
        message: String,
        #[arg(long, default_value = "chat")]
        model: ChatModel,
        #[arg(long)]
        url: Option<String>,
        /// Give up waiting for a reply after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mapchat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Chat { model, url } => run_chat(model, url).await,
        Command::Send {
            message,
            model,
            url,
            timeout_secs,
        } => run_send(message, model, url, timeout_secs).await,
    }
}

fn build_config(model: ChatModel, url: Option<String>) -> Result<SessionConfig> {
    let mut config = SessionConfig::from_env();
    config.model = model;
    if let Some(url) = url {
        config.ws_base_url = url;
    }
    Url::parse(&config.ws_base_url).context("invalid WebSocket base URL")?;
    Ok(config)
}

async fn run_chat(model: ChatModel, url: Option<String>) -> Result<()> {
    let config = build_config(model, url)?;
    let endpoint = config.endpoint_url();
    let session = ChatSession::new(config);
    let mut events = session.subscribe();
    session.connect().await;

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("Connecting to {endpoint} — type a question, /reset to start over, Ctrl-D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/reset" {
            session.reset().await;
            continue;
        }
        if let Err(err) = session.submit(line).await {
            eprintln!("! {err}");
        } else {
            let snapshot = session.snapshot().await;
            println!("({} questions left)", snapshot.remaining_questions);
        }
    }

    session.close().await;
    printer.abort();
    Ok(())
}

async fn run_send(message: String, model: ChatModel, url: Option<String>, timeout_secs: u64) -> Result<()> {
    let config = build_config(model, url)?;
    let session = ChatSession::new(config);
    let mut events = session.subscribe();
    session.connect().await;

    let deadline = Duration::from_secs(timeout_secs);
    wait_for(&mut events, deadline, |event| {
        matches!(event, SessionEvent::Connected)
    })
    .await
    .context("timed out waiting for connection")?;

    session.submit(&message).await?;

    let reply = wait_for(&mut events, deadline, |event| {
        matches!(
            event,
            SessionEvent::MessageAppended(m) if m.kind == MessageKind::Assistant
        ) || matches!(event, SessionEvent::TranscriptReplaced(_))
    })
    .await
    .context("timed out waiting for a reply")?;

    match reply {
        SessionEvent::MessageAppended(m) => println!("{}", m.content),
        SessionEvent::TranscriptReplaced(messages) => {
            for m in messages.iter().filter(|m| m.kind == MessageKind::Assistant) {
                println!("{}", m.content);
            }
        }
        _ => {}
    }

    session.close().await;
    Ok(())
}

async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    deadline: Duration,
    predicate: impl Fn(&SessionEvent) -> bool,
) -> Result<SessionEvent> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => bail!("session event stream closed"),
            }
        }
    };
    tokio::time::timeout(deadline, wait)
        .await
        .context("deadline elapsed")?
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected => println!("* connected"),
        SessionEvent::Disconnected => println!("* disconnected, trying to reconnect…"),
        SessionEvent::Reconnecting { delay } => {
            println!("* retrying in {}ms", delay.as_millis());
        }
        SessionEvent::MessageAppended(m) => match m.kind {
            MessageKind::User => {}
            MessageKind::System => println!("[system] {}", m.content),
            MessageKind::Assistant => println!("[assistant] {}", m.content),
        },
        SessionEvent::TranscriptReplaced(messages) => {
            if let Some(m) = messages.iter().rev().find(|m| m.kind != MessageKind::User) {
                println!("[{}] {}", if m.kind == MessageKind::System { "system" } else { "assistant" }, m.content);
            }
        }
        SessionEvent::MapData(collection) => {
            println!("* map updated ({} features)", collection.len());
        }
        SessionEvent::Error(message) => eprintln!("! {message}"),
    }
}
