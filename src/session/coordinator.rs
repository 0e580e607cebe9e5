//! Chat session coordinator
//!
//! One `ChatSession` owns one socket at a time. A supervisor task runs
//! the connect / read / reconnect cycle; consumers drive the session
//! through the async methods and observe it through the event channel.
//! Teardown is a cancellation token: once cancelled, the supervisor
//! exits, the pending reconnect timer dies with it, and no further
//! socket is created.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{ChatModel, SessionConfig};
use super::events::{SessionEvent, SessionEvents};
use super::state::{SessionSnapshot, SessionState};
use crate::error::SessionError;
use crate::filters::FilterState;
use crate::protocol::{self, Outbound};
use crate::transport::{SocketSink, SocketStream, Transport, WsTransport};

/// One logical chat conversation bound to one model endpoint and one
/// question budget. Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ChatSession {
    id: Uuid,
    config: Arc<RwLock<SessionConfig>>,
    state: Arc<RwLock<SessionState>>,
    events: SessionEvents,
    transport: Arc<dyn Transport>,
    sink: Arc<Mutex<Option<Box<dyn SocketSink>>>>,
    shutdown: Arc<Mutex<CancellationToken>>,
}

impl ChatSession {
    /// Session over the production WebSocket transport. Does not connect
    /// yet; call [`ChatSession::connect`].
    pub fn new(config: SessionConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let state = SessionState::new(config.question_budget);
        Self {
            id: Uuid::new_v4(),
            config: Arc::new(RwLock::new(config)),
            state: Arc::new(RwLock::new(state)),
            events: SessionEvents::default(),
            transport,
            sink: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    /// Start (or restart) the supervisor. Any previous supervisor is
    /// cancelled first, so at most one connect/read/reconnect cycle runs
    /// per session.
    pub async fn connect(&self) {
        let token = {
            let mut guard = self.shutdown.lock().await;
            guard.cancel();
            *guard = CancellationToken::new();
            guard.clone()
        };
        let session = self.clone();
        tokio::spawn(async move { session.run(token).await });
    }

    /// Tear the session down: cancel the supervisor (including any
    /// pending reconnect timer) and close the socket. Idempotent.
    pub async fn close(&self) {
        self.shutdown.lock().await.cancel();

        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }

        let was_connected = {
            let mut state = self.state.write().await;
            let was = state.connected;
            state.mark_closed();
            was
        };
        if was_connected {
            self.events.emit(SessionEvent::Disconnected);
        }
        debug!(session = %self.id, "session closed");
    }

    /// Full reset: fresh transcript, full question budget, cleared
    /// error, and a new connection attempt.
    pub async fn reset(&self) {
        info!(session = %self.id, "resetting chat session");
        self.close().await;
        {
            let config = self.config.read().await;
            self.state.write().await.reset(config.question_budget);
        }
        self.connect().await;
    }

    /// Switch the backing model. A deliberate full reset, not a graceful
    /// migration: the old socket is torn down before the new endpoint is
    /// dialed.
    pub async fn switch_model(&self, model: ChatModel) {
        info!(session = %self.id, %model, "switching chat model");
        self.config.write().await.model = model;
        self.reset().await;
    }

    /// Submit one user question. On acceptance the user message is
    /// appended optimistically, one question is burned, and the frame
    /// goes out; the session stays in loading until the next inbound
    /// frame.
    pub async fn submit(&self, text: &str) -> Result<(), SessionError> {
        let message = {
            let config = self.config.read().await;
            let mut state = self.state.write().await;
            if let Err(err) = state.check_submit(text, config.max_message_chars) {
                warn!(session = %self.id, error = %err, "submission rejected");
                state.record_error(&err);
                drop(state);
                drop(config);
                self.events.emit(SessionEvent::Error(err.to_string()));
                return Err(err);
            }
            state.accept_submit(text)
        };
        self.events.emit(SessionEvent::MessageAppended(message.clone()));
        if let Err(err) = self.dispatch(Outbound::chat(text)).await {
            // the socket dropped between the gate and the send: the frame
            // never left, so undo the optimistic append and refund the
            // question, then let subscribers resync to the transcript
            let transcript = {
                let mut state = self.state.write().await;
                state.rollback_submit(&message.id);
                state.transcript.clone()
            };
            self.events.emit(SessionEvent::TranscriptReplaced(transcript));
            return Err(err);
        }
        Ok(())
    }

    /// Forward the current dashboard filters to the assistant. The
    /// filter snapshot is remembered on the session even if the send
    /// fails; sends are never queued.
    pub async fn update_filters(&self, filters: FilterState) -> Result<(), SessionError> {
        let frame = Outbound::filter_update(&filters)
            .map_err(|e| SessionError::MalformedFrame(e.to_string()))?;
        self.state.write().await.current_filters = filters;
        self.dispatch(frame).await
    }

    /// Forward the census tracts currently selected on the map.
    pub async fn select_census_tracts(&self, tracts: Vec<String>) -> Result<(), SessionError> {
        self.dispatch(Outbound::census_update(tracts)).await
    }

    /// Send one outbound frame, surfacing any failure on the session.
    async fn dispatch(&self, frame: Outbound) -> Result<(), SessionError> {
        debug!(session = %self.id, frame_type = frame.frame_type(), "dispatching frame");
        match self.send_frame(&frame).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(session = %self.id, frame_type = frame.frame_type(), error = %err, "send failed");
                self.state.write().await.record_error(&err);
                self.events.emit(SessionEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn send_frame(&self, frame: &Outbound) -> Result<(), SessionError> {
        let text = frame.to_frame()?;
        if !self.state.read().await.connected {
            return Err(SessionError::NotConnected);
        }
        let mut slot = self.sink.lock().await;
        match slot.as_mut() {
            Some(sink) => sink.send_text(text).await,
            None => Err(SessionError::NotConnected),
        }
    }

    /// Supervisor: connect, pump frames until the socket dies, then wait
    /// the flat reconnect delay and try again, forever — until cancelled.
    async fn run(self, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                break;
            }
            let url = self.config.read().await.endpoint_url();
            debug!(session = %self.id, %url, "opening websocket");

            match self.transport.connect(&url).await {
                Ok((mut sink, stream)) => {
                    // install and close() serialize on the shutdown lock:
                    // a teardown during the handshake can never be
                    // overtaken by a late socket
                    let installed = {
                        let _guard = self.shutdown.lock().await;
                        if token.is_cancelled() {
                            let _ = sink.close().await;
                            false
                        } else {
                            // exactly one open socket: retire any prior
                            // handle before installing the new one
                            let mut slot = self.sink.lock().await;
                            if let Some(mut old) = slot.take() {
                                let _ = old.close().await;
                            }
                            *slot = Some(sink);
                            self.state.write().await.mark_connected();
                            true
                        }
                    };
                    if !installed {
                        debug!(session = %self.id, "connect resolved after teardown, socket discarded");
                        break;
                    }
                    self.events.emit(SessionEvent::Connected);
                    info!(session = %self.id, %url, "websocket connected");

                    self.read_loop(stream, &token).await;

                    if token.is_cancelled() {
                        break;
                    }
                    self.sink.lock().await.take();
                    self.events.emit(SessionEvent::Disconnected);
                }
                Err(err) => {
                    warn!(session = %self.id, %url, error = %err, "websocket connect failed");
                    {
                        let mut state = self.state.write().await;
                        state.connected = false;
                        state.record_error(&err);
                    }
                    self.events.emit(SessionEvent::Error(err.to_string()));
                }
            }

            if token.is_cancelled() {
                break;
            }
            let delay = self.config.read().await.reconnect_delay;
            debug!(session = %self.id, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            self.events.emit(SessionEvent::Reconnecting { delay });
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!(session = %self.id, "session supervisor stopped");
    }

    /// Pump inbound frames until closure, error, or cancellation. Records
    /// the disconnect cause on the state before returning.
    async fn read_loop(&self, mut stream: Box<dyn SocketStream>, token: &CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                item = stream.next_text() => match item {
                    Some(Ok(text)) => self.handle_frame(&text).await,
                    Some(Err(err)) => {
                        warn!(session = %self.id, error = %err, "websocket transport error");
                        self.state.write().await.mark_socket_error();
                        self.events.emit(SessionEvent::Error(
                            SessionError::SocketError.to_string(),
                        ));
                        return;
                    }
                    None => {
                        info!(session = %self.id, "websocket closed by peer");
                        self.state.write().await.mark_closed();
                        return;
                    }
                }
            }
        }
    }

    /// Parse and fold one inbound frame. Malformed JSON is surfaced as
    /// the session error and dropped; the socket stays open.
    async fn handle_frame(&self, text: &str) {
        match protocol::parse_frame(text) {
            Ok(frame) => {
                let events = self.state.write().await.apply_inbound(frame);
                for event in events {
                    self.events.emit(event);
                }
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "dropping malformed frame");
                self.state.write().await.record_error(&err);
                self.events.emit(SessionEvent::Error(err.to_string()));
            }
        }
    }
}
