//! Session error taxonomy

use thiserror::Error;

/// Everything that can go wrong inside a chat session.
///
/// None of these terminate the process: each is captured into the
/// session's `error` field and surfaced to the consumer. `SocketError`
/// and `SocketClosed` feed the reconnect loop; the three submission
/// errors are terminal for that one submission attempt only.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Outbound send attempted while the socket is not open.
    /// Sends are never queued, the caller must retry after reconnect.
    #[error("Not connected")]
    NotConnected,

    /// Candidate message exceeds the configured character cap.
    #[error("Message exceeds {cap} characters")]
    MessageTooLong { cap: usize },

    /// No questions remain in the session budget.
    #[error("Question limit reached. Reset the chat to continue.")]
    QuestionBudgetExhausted,

    /// Inbound frame did not parse as any known shape. The connection
    /// stays open; the frame is dropped.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Transport-level failure reported by the socket.
    #[error("WebSocket error occurred")]
    SocketError,

    /// The socket closed, normally or abnormally.
    #[error("WebSocket closed")]
    SocketClosed,
}

impl SessionError {
    /// Stable tag for log fields and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::NotConnected => "not_connected",
            SessionError::MessageTooLong { .. } => "message_too_long",
            SessionError::QuestionBudgetExhausted => "question_budget_exhausted",
            SessionError::MalformedFrame(_) => "malformed_frame",
            SessionError::SocketError => "socket_error",
            SessionError::SocketClosed => "socket_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_strings() {
        assert_eq!(
            SessionError::MessageTooLong { cap: 1000 }.to_string(),
            "Message exceeds 1000 characters"
        );
        assert_eq!(SessionError::SocketError.to_string(), "WebSocket error occurred");
        assert_eq!(SessionError::NotConnected.to_string(), "Not connected");
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(SessionError::NotConnected.kind(), "not_connected");
        assert_eq!(
            SessionError::MalformedFrame("bad".into()).kind(),
            "malformed_frame"
        );
    }
}
