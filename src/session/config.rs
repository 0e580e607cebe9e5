//! Session configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Questions allowed per session before a reset is required.
pub const DEFAULT_QUESTION_BUDGET: u32 = 10;
/// Character cap on a single outbound chat message.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 1000;
/// Flat delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

/// Backing assistant endpoint. Selecting a different model tears the
/// session down and starts fresh against the new path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatModel {
    Chat,
    Sparql,
}

impl ChatModel {
    /// Path appended to the WebSocket base URL.
    pub fn path(&self) -> &'static str {
        match self {
            ChatModel::Chat => "/chat",
            ChatModel::Sparql => "/sparql",
        }
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatModel::Chat => write!(f, "chat"),
            ChatModel::Sparql => write!(f, "sparql"),
        }
    }
}

impl FromStr for ChatModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chat" => Ok(ChatModel::Chat),
            "sparql" => Ok(ChatModel::Sparql),
            other => Err(format!("unknown chat model '{other}' (expected: chat, sparql)")),
        }
    }
}

/// Configuration for one chat session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket base URL; the model path is appended to it.
    pub ws_base_url: String,
    pub model: ChatModel,
    pub question_budget: u32,
    pub max_message_chars: usize,
    /// Flat retry interval, no backoff growth and no attempt ceiling.
    pub reconnect_delay: Duration,
}

impl SessionConfig {
    /// Create config from environment with defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            ws_base_url: std::env::var("MAPCHAT_WS_BASE_URL")
                .unwrap_or_else(|_| "ws://localhost:8000".into()),
            model: std::env::var("MAPCHAT_MODEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(ChatModel::Chat),
            question_budget: std::env::var("MAPCHAT_QUESTION_BUDGET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_QUESTION_BUDGET),
            max_message_chars: std::env::var("MAPCHAT_MAX_MESSAGE_CHARS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_MESSAGE_CHARS),
            reconnect_delay: Duration::from_millis(
                std::env::var("MAPCHAT_RECONNECT_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
            ),
        }
    }

    /// Full WebSocket URL for the configured model.
    pub fn endpoint_url(&self) -> String {
        format!("{}{}", self.ws_base_url.trim_end_matches('/'), self.model.path())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
