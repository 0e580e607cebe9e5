//! Session state: transcript, question budget, connection flags
//!
//! Two concerns live here as plain synchronous methods so they stay
//! unit-testable without a socket: the submission policy (length cap,
//! question budget, connectivity gate) and the transcript synchronizer
//! (full-replace vs. incremental-append inbound frames).

use chrono::Utc;
use tracing::{debug, warn};

use super::events::SessionEvent;
use crate::error::SessionError;
use crate::filters::FilterState;
use crate::protocol::{Inbound, Message, MessageKind, TaskPayload};

/// Mutable state of one chat session.
#[derive(Debug)]
pub struct SessionState {
    pub transcript: Vec<Message>,
    pub remaining_questions: u32,
    pub connected: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub current_filters: FilterState,
    /// Disambiguates user-message ids minted within the same millisecond.
    next_local_seq: u64,
}

/// Read-only view handed to consumers.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub transcript: Vec<Message>,
    pub remaining_questions: u32,
    pub connected: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub current_filters: FilterState,
}

impl SessionState {
    pub fn new(question_budget: u32) -> Self {
        Self {
            transcript: Vec::new(),
            remaining_questions: question_budget,
            connected: false,
            loading: false,
            error: None,
            current_filters: FilterState::default(),
            next_local_seq: 0,
        }
    }

    /// Wipe everything back to a fresh session with a full budget.
    pub fn reset(&mut self, question_budget: u32) {
        self.transcript.clear();
        self.remaining_questions = question_budget;
        self.loading = false;
        self.error = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            transcript: self.transcript.clone(),
            remaining_questions: self.remaining_questions,
            connected: self.connected,
            loading: self.loading,
            error: self.error.clone(),
            current_filters: self.current_filters.clone(),
        }
    }

    pub fn record_error(&mut self, err: &SessionError) {
        self.error = Some(err.to_string());
    }

    /// Socket opened: connectivity errors are stale now.
    pub fn mark_connected(&mut self) {
        self.connected = true;
        self.error = None;
    }

    /// Clean closure: transcript stays, transient error is cleared.
    pub fn mark_closed(&mut self) {
        self.connected = false;
        self.error = None;
    }

    /// Transport failure: keep the error visible for the consumer.
    pub fn mark_socket_error(&mut self) {
        self.connected = false;
        self.error = Some(SessionError::SocketError.to_string());
    }

    // --- submission policy ---

    /// Gate an outbound chat message. Checks run in a fixed order:
    /// length cap, question budget, connectivity. A rejection leaves
    /// transcript and budget untouched.
    pub fn check_submit(&self, text: &str, max_chars: usize) -> Result<(), SessionError> {
        if text.chars().count() > max_chars {
            return Err(SessionError::MessageTooLong { cap: max_chars });
        }
        if self.remaining_questions == 0 {
            return Err(SessionError::QuestionBudgetExhausted);
        }
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }

    /// Optimistic accept: append the local user message before any
    /// server ack, burn one question, and wait for the next inbound
    /// frame. Callers must have run `check_submit` first.
    pub fn accept_submit(&mut self, text: &str) -> Message {
        let message = Message::new(
            self.next_local_id(),
            MessageKind::User,
            text,
            Utc::now().timestamp_millis(),
        );
        self.transcript.push(message.clone());
        self.remaining_questions = self.remaining_questions.saturating_sub(1);
        self.loading = true;
        self.error = None;
        message
    }

    /// Undo an optimistic accept whose frame never left the client:
    /// drop the appended user message, refund the question, and leave
    /// the loading state.
    pub fn rollback_submit(&mut self, message_id: &str) {
        if let Some(pos) = self.transcript.iter().rposition(|m| m.id == message_id) {
            self.transcript.remove(pos);
        }
        self.remaining_questions += 1;
        self.loading = false;
    }

    fn next_local_id(&mut self) -> String {
        self.next_local_seq += 1;
        format!("{}-{}", Utc::now().timestamp_millis(), self.next_local_seq)
    }

    // --- transcript synchronizer ---

    /// Fold one inbound frame into the session and return the events to
    /// publish. A batch replaces the whole transcript; a single
    /// system/assistant message appends; a task-tagged payload is routed
    /// to the map and never enters the transcript. Any valid frame ends
    /// the loading state.
    pub fn apply_inbound(&mut self, frame: Inbound) -> Vec<SessionEvent> {
        self.loading = false;
        match frame {
            Inbound::Batch { messages } => {
                debug!(count = messages.len(), "transcript replaced by server sync");
                self.transcript = messages.clone();
                vec![SessionEvent::TranscriptReplaced(messages)]
            }
            Inbound::Single(mut message) => {
                if let Some(TaskPayload::FilterUpdate(collection)) = message.payload.take() {
                    debug!(features = collection.len(), "map payload received");
                    return vec![SessionEvent::MapData(collection)];
                }
                match message.kind {
                    MessageKind::System | MessageKind::Assistant => {
                        self.transcript.push(message.clone());
                        vec![SessionEvent::MessageAppended(message)]
                    }
                    MessageKind::User => {
                        // the server echoes user content only in batch syncs
                        warn!(id = %message.id, "dropping unexpected incremental user frame");
                        vec![]
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::geo::FeatureCollection;
    use crate::protocol::parse_frame;

    fn assistant(id: &str, content: &str) -> Message {
        Message::new(id, MessageKind::Assistant, content, 1_700_000_000_000)
    }

    #[test]
    fn test_check_submit_order() {
        let mut state = SessionState::new(0);
        state.connected = false;

        // length outranks budget outranks connectivity
        let long = "x".repeat(11);
        assert!(matches!(
            state.check_submit(&long, 10),
            Err(SessionError::MessageTooLong { cap: 10 })
        ));
        assert!(matches!(
            state.check_submit("hi", 10),
            Err(SessionError::QuestionBudgetExhausted)
        ));

        state.remaining_questions = 1;
        assert!(matches!(state.check_submit("hi", 10), Err(SessionError::NotConnected)));

        state.connected = true;
        assert!(state.check_submit("hi", 10).is_ok());
    }

    #[test]
    fn test_cap_counts_characters_not_bytes() {
        let mut state = SessionState::new(5);
        state.connected = true;
        // four multibyte characters are within a cap of 4
        assert!(state.check_submit("çîrœ", 4).is_ok());
        assert!(state.check_submit("çîrœx", 4).is_err());
    }

    #[test]
    fn test_accept_submit_appends_and_decrements() {
        let mut state = SessionState::new(10);
        state.connected = true;

        let message = state.accept_submit("ping");
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.remaining_questions, 9);
        assert!(state.loading);
        assert_eq!(message.kind, MessageKind::User);
        assert_eq!(state.transcript[0].id, message.id);

        let second = state.accept_submit("pong?");
        assert_ne!(second.id, message.id);
        assert_eq!(state.remaining_questions, 8);
    }

    #[test]
    fn test_rollback_submit_refunds_and_removes_message() {
        let mut state = SessionState::new(10);
        state.connected = true;

        let kept = state.accept_submit("first");
        let lost = state.accept_submit("second");
        assert_eq!(state.remaining_questions, 8);

        state.rollback_submit(&lost.id);

        assert_eq!(state.remaining_questions, 9);
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript[0].id, kept.id);
        assert!(!state.loading);

        // unknown id still refunds the burned question, transcript untouched
        state.rollback_submit("no-such-id");
        assert_eq!(state.remaining_questions, 10);
        assert_eq!(state.transcript.len(), 1);
    }

    #[test]
    fn test_budget_never_goes_negative() {
        let mut state = SessionState::new(1);
        state.connected = true;
        state.accept_submit("one");
        assert_eq!(state.remaining_questions, 0);
        assert!(matches!(
            state.check_submit("two", 1000),
            Err(SessionError::QuestionBudgetExhausted)
        ));
        assert_eq!(state.remaining_questions, 0);
    }

    #[test]
    fn test_batch_replaces_transcript() {
        let mut state = SessionState::new(10);
        state.transcript = vec![
            assistant("a", "old 1"),
            assistant("b", "old 2"),
            assistant("c", "old 3"),
        ];
        state.loading = true;

        let frame = Inbound::Batch {
            messages: vec![assistant("x", "fresh")],
        };
        let events = state.apply_inbound(frame);

        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript[0].id, "x");
        assert!(!state.loading);
        assert!(matches!(&events[..], [SessionEvent::TranscriptReplaced(m)] if m.len() == 1));
    }

    #[test]
    fn test_single_assistant_appends() {
        let mut state = SessionState::new(10);
        state.transcript = vec![assistant("a", "first")];

        let events = state.apply_inbound(Inbound::Single(assistant("b", "second")));

        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[1].content, "second");
        assert!(matches!(&events[..], [SessionEvent::MessageAppended(_)]));
    }

    #[test]
    fn test_map_payload_bypasses_transcript() {
        let mut state = SessionState::new(10);
        state.loading = true;

        let mut message = assistant("geo", "");
        message.payload = Some(TaskPayload::FilterUpdate(FeatureCollection::new(vec![])));
        let events = state.apply_inbound(Inbound::Single(message));

        assert!(state.transcript.is_empty());
        assert!(!state.loading);
        assert!(matches!(&events[..], [SessionEvent::MapData(_)]));
    }

    #[test]
    fn test_incremental_user_frame_is_dropped() {
        let mut state = SessionState::new(10);
        let frame = parse_frame(r#"{"id":"1","type":"user","content":"echo"}"#).unwrap();

        let events = state.apply_inbound(frame);

        assert!(state.transcript.is_empty());
        assert!(events.is_empty());
        assert!(!state.loading);
    }

    #[test]
    fn test_reset_restores_budget_and_clears_state() {
        let mut state = SessionState::new(10);
        state.connected = true;
        state.accept_submit("ping");
        state.record_error(&SessionError::SocketError);

        state.reset(10);

        assert!(state.transcript.is_empty());
        assert_eq!(state.remaining_questions, 10);
        assert!(state.error.is_none());
        assert!(!state.loading);
        // connectivity is owned by the socket lifecycle, not the reset
        assert!(state.connected);
    }

    #[test]
    fn test_connection_marks() {
        let mut state = SessionState::new(10);
        state.mark_socket_error();
        assert!(!state.connected);
        assert_eq!(state.error.as_deref(), Some("WebSocket error occurred"));

        state.mark_connected();
        assert!(state.connected);
        assert!(state.error.is_none());

        state.mark_closed();
        assert!(!state.connected);
        assert!(state.error.is_none());
    }
}
