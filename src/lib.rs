//! mapchat — WebSocket chat client for the incident-map dashboard
//!
//! Coordinates one real-time assistant session per surface: socket
//! lifecycle with flat-delay auto-reconnect, a bounded question budget
//! with a message-length cap, transcript synchronization (full-replace
//! and incremental frames), and the filter/census side channels that
//! share the socket with chat without touching the transcript.

pub mod error;
pub mod filters;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::SessionError;
pub use filters::FilterState;
pub use session::{ChatModel, ChatSession, SessionConfig, SessionEvent, SessionSnapshot};
