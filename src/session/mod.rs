//! Chat session coordination
//!
//! This module provides:
//! - `SessionConfig` / `ChatModel` — endpoint and policy knobs
//! - `SessionState` — transcript, question budget, connection flags
//! - `SessionEvents` — the one typed channel every consumer subscribes to
//! - `ChatSession` — the coordinator tying socket lifecycle to state

pub mod config;
pub mod coordinator;
pub mod events;
pub mod state;

pub use config::{ChatModel, SessionConfig};
pub use coordinator::ChatSession;
pub use events::{SessionEvent, SessionEvents};
pub use state::{SessionSnapshot, SessionState};
