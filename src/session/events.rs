//! Typed session event channel
//!
//! The coordinator publishes every observable state change on one
//! broadcast channel. Consumers (UI, map layer, CLI) subscribe without
//! the connection code knowing who is listening.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use crate::protocol::geo::FeatureCollection;
use crate::protocol::Message;

/// Default capacity for the event channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// What a session can tell its subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Socket opened; the session error was cleared.
    Connected,
    /// Socket is gone (clean close, error, or teardown).
    Disconnected,
    /// A reconnect attempt is scheduled after `delay`.
    Reconnecting { delay: Duration },
    /// Full-state sync: the transcript was replaced wholesale.
    TranscriptReplaced(Vec<Message>),
    /// Incremental sync: one message was appended.
    MessageAppended(Message),
    /// Map-driving payload, never inserted into the transcript.
    MapData(FeatureCollection),
    /// An error was recorded on the session.
    Error(String),
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Connected => "connected",
            SessionEvent::Disconnected => "disconnected",
            SessionEvent::Reconnecting { .. } => "reconnecting",
            SessionEvent::TranscriptReplaced(_) => "transcript_replaced",
            SessionEvent::MessageAppended(_) => "message_appended",
            SessionEvent::MapData(_) => "map_data",
            SessionEvent::Error(_) => "error",
        }
    }
}

/// Broadcast wrapper the session emits through.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Fire and forget: delivery failure only means nobody is listening.
    pub fn emit(&self, event: SessionEvent) {
        debug!(event_type = event.event_type(), "session event");
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
