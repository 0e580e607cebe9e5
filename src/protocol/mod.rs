//! Wire protocol for the chat WebSocket
//!
//! JSON text frames in both directions. Outbound frames are a tagged
//! union over `type` (`chat`, `filter_update`, `census_update`), each
//! carrying `isUser: true`. Inbound frames are either a full-transcript
//! batch (`{"messages": [...]}`) or a single incremental message,
//! optionally task-tagged with a map payload.

pub mod geo;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::filters::FilterState;
use geo::FeatureCollection;

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    System,
    Assistant,
}

/// Task-tagged payload riding on a message.
///
/// Closed set keyed by the `task` discriminator: classification is
/// exhaustive, and an unknown task fails the parse instead of smuggling
/// untyped data into the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "data", rename_all = "snake_case")]
pub enum TaskPayload {
    /// GeoJSON consumed by the map layer instead of the transcript.
    FilterUpdate(FeatureCollection),
}

/// One transcript entry.
///
/// User message ids are client-generated from a timestamp source;
/// system/assistant ids are server-assigned. Once appended to a
/// transcript the id never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    /// Epoch millis.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: Option<TaskPayload>,
}

impl Message {
    pub fn new(id: impl Into<String>, kind: MessageKind, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            timestamp,
            payload: None,
        }
    }
}

/// Client → server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Chat {
        content: String,
        #[serde(rename = "isUser")]
        is_user: bool,
    },
    FilterUpdate {
        #[serde(rename = "isUser")]
        is_user: bool,
        /// JSON-encoded [`FilterState`]. The server expects the filter
        /// object stringified inside `content`, not inlined.
        content: String,
    },
    CensusUpdate {
        #[serde(rename = "isUser")]
        is_user: bool,
        #[serde(rename = "censusTracts")]
        census_tracts: Vec<String>,
    },
}

impl Outbound {
    pub fn chat(content: impl Into<String>) -> Self {
        Outbound::Chat {
            content: content.into(),
            is_user: true,
        }
    }

    pub fn filter_update(filters: &FilterState) -> Result<Self, serde_json::Error> {
        Ok(Outbound::FilterUpdate {
            is_user: true,
            content: serde_json::to_string(filters)?,
        })
    }

    pub fn census_update(census_tracts: Vec<String>) -> Self {
        Outbound::CensusUpdate {
            is_user: true,
            census_tracts,
        }
    }

    /// Wire tag, for log fields.
    pub fn frame_type(&self) -> &'static str {
        match self {
            Outbound::Chat { .. } => "chat",
            Outbound::FilterUpdate { .. } => "filter_update",
            Outbound::CensusUpdate { .. } => "census_update",
        }
    }

    pub fn to_frame(&self) -> Result<String, SessionError> {
        serde_json::to_string(self).map_err(|e| SessionError::MalformedFrame(e.to_string()))
    }
}

/// Server → client frame.
///
/// A batch replaces the whole transcript (the server is the source of
/// truth for that frame shape); a single message appends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Batch { messages: Vec<Message> },
    Single(Message),
}

/// Parse one inbound text frame. Anything that matches neither shape is
/// a [`SessionError::MalformedFrame`]; the caller keeps the socket open.
pub fn parse_frame(text: &str) -> Result<Inbound, SessionError> {
    serde_json::from_str(text).map_err(|e| SessionError::MalformedFrame(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_frame_shape() {
        let frame = Outbound::chat("where are incidents concentrated?");
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["type"], "chat");
        assert_eq!(value["content"], "where are incidents concentrated?");
        assert_eq!(value["isUser"], true);
        assert_eq!(frame.frame_type(), "chat");
    }

    #[test]
    fn test_filter_update_frame_stringifies_filters() {
        let filters = FilterState {
            start_year: Some(2020),
            ..Default::default()
        };
        let frame = Outbound::filter_update(&filters).unwrap();
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["type"], "filter_update");
        assert_eq!(value["isUser"], true);
        // content is a JSON string, not an object
        let inner: FilterState = serde_json::from_str(value["content"].as_str().unwrap()).unwrap();
        assert_eq!(inner, filters);
    }

    #[test]
    fn test_census_update_frame_shape() {
        let frame = Outbound::census_update(vec!["42101001500".into(), "42101001600".into()]);
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["type"], "census_update");
        assert_eq!(value["censusTracts"][1], "42101001600");
        assert_eq!(value["isUser"], true);
    }

    #[test]
    fn test_parse_batch_frame() {
        let raw = r#"{"messages":[
            {"id":"1","type":"user","content":"ping","timestamp":1700000000000},
            {"id":"2","type":"assistant","content":"pong","timestamp":1700000000500}
        ]}"#;

        match parse_frame(raw).unwrap() {
            Inbound::Batch { messages } => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].kind, MessageKind::User);
                assert_eq!(messages[1].content, "pong");
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_single_assistant_frame() {
        let raw = r#"{"id":"7","type":"assistant","content":"done","timestamp":1700000001000}"#;

        match parse_frame(raw).unwrap() {
            Inbound::Single(msg) => {
                assert_eq!(msg.id, "7");
                assert_eq!(msg.kind, MessageKind::Assistant);
                assert!(msg.payload.is_none());
            }
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_task_tagged_frame() {
        let raw = r#"{
            "id": "8",
            "type": "assistant",
            "content": "",
            "timestamp": 1700000002000,
            "task": "filter_update",
            "data": {"type": "FeatureCollection", "features": []}
        }"#;

        match parse_frame(raw).unwrap() {
            Inbound::Single(msg) => match msg.payload {
                Some(TaskPayload::FilterUpdate(fc)) => assert!(fc.is_empty()),
                other => panic!("expected filter_update payload, got {other:?}"),
            },
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_frame("not json at all"),
            Err(SessionError::MalformedFrame(_))
        ));
        // valid JSON, but neither a batch nor a message
        assert!(matches!(
            parse_frame(r#"{"status":"ok"}"#),
            Err(SessionError::MalformedFrame(_))
        ));
        // unknown message kind
        assert!(matches!(
            parse_frame(r#"{"id":"1","type":"robot","content":"hi"}"#),
            Err(SessionError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_missing_timestamp_defaults_to_zero() {
        let raw = r#"{"id":"3","type":"system","content":"limit reached"}"#;
        match parse_frame(raw).unwrap() {
            Inbound::Single(msg) => assert_eq!(msg.timestamp, 0),
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn test_message_roundtrip_with_payload() {
        let mut msg = Message::new("9", MessageKind::Assistant, "", 1_700_000_003_000);
        msg.payload = Some(TaskPayload::FilterUpdate(FeatureCollection::new(vec![])));

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["task"], "filter_update");
        assert_eq!(value["data"]["type"], "FeatureCollection");

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }
}
