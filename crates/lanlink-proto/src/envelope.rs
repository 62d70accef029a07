use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::feedback::FeedbackKind;
use crate::operation::OperationType;

/// Key the correlation identifier travels under, inside `data`.
pub const MSG_ID_KEY: &str = "msgId";

/// Reserved feedback kind: the backend finished logical initialization.
pub const FEEDBACK_BACKEND_STARTED: &str = "backend_started";

/// Reserved feedback kind: a diagnostic log line from the backend.
pub const FEEDBACK_LOG_MESSAGE: &str = "log_message";

/// Outbound request envelope (GUI → backend).
///
/// `data` always carries the correlation identifier under [`MSG_ID_KEY`];
/// the backend echoes it back in its response.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub operation: OperationType,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl RequestEnvelope {
    /// Build an envelope, stamping `msg_id` into the data object.
    ///
    /// Non-object `data` is wrapped in an object first; the identifier must
    /// live at `data.msgId` for the backend to echo it.
    pub fn new(operation: OperationType, data: Value, msg_id: u64) -> Self {
        let mut data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        data.insert(MSG_ID_KEY.to_string(), Value::from(msg_id));

        Self {
            operation,
            data: Value::Object(data),
            timestamp: Utc::now(),
        }
    }
}

/// An unsolicited backend event delivered to the consumer.
///
/// `extra` picks up any top-level fields beyond `feedback`/`data`; the
/// backend is free to add siblings and older GUIs must not choke on them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    pub feedback: String,
    #[serde(default)]
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventEnvelope {
    pub fn kind(&self) -> FeedbackKind {
        FeedbackKind::from_wire(&self.feedback)
    }
}

/// A decoded inbound frame, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Reserved startup signal; drives readiness, never forwarded.
    BackendStarted,
    /// Reserved diagnostic signal; re-logged, never forwarded.
    LogMessage {
        level: Option<String>,
        message: String,
    },
    /// Backend-initiated event for the consumer.
    Event(EventEnvelope),
    /// Response to a correlated request. `data` no longer carries the id.
    Response { msg_id: u64, data: Value },
    /// Neither a feedback tag nor a correlation id: a protocol violation,
    /// dropped with a diagnostic rather than guessed at.
    Malformed(Value),
}

impl InboundMessage {
    /// Classify a decoded inbound envelope.
    ///
    /// Reserved feedback kinds are intercepted first, then any other
    /// `feedback` tag makes an event, then a `data.msgId` makes a
    /// response. Anything else is malformed — a response that lost its
    /// identifier must not masquerade as an event.
    pub fn classify(value: Value) -> Self {
        if let Some(feedback) = value.get("feedback").and_then(Value::as_str) {
            match feedback {
                FEEDBACK_BACKEND_STARTED => return InboundMessage::BackendStarted,
                FEEDBACK_LOG_MESSAGE => {
                    let level = value
                        .get("level")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let message = value
                        .get("payload")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    return InboundMessage::LogMessage { level, message };
                }
                _ => {}
            }

            return match serde_json::from_value::<EventEnvelope>(value.clone()) {
                Ok(event) => InboundMessage::Event(event),
                Err(_) => InboundMessage::Malformed(value),
            };
        }

        if let Some(data) = value.get("data") {
            if let Some(msg_id) = data.get(MSG_ID_KEY).and_then(Value::as_u64) {
                let mut data = data.clone();
                if let Some(map) = data.as_object_mut() {
                    map.remove(MSG_ID_KEY);
                }
                return InboundMessage::Response { msg_id, data };
            }
        }

        InboundMessage::Malformed(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_envelope_stamps_msg_id() {
        let envelope = RequestEnvelope::new(
            OperationType::ConnectToDevice,
            json!({"device_id": "abc", "pin_code": "1234"}),
            7,
        );

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["operation"], "ConnectToDevice");
        assert_eq!(wire["data"]["msgId"], 7);
        assert_eq!(wire["data"]["device_id"], "abc");
        // chrono's serde emits RFC 3339, e.g. 2026-08-30T12:00:00Z
        assert!(wire["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn request_envelope_wraps_non_object_data() {
        let envelope = RequestEnvelope::new(OperationType::ExitApp, Value::Null, 1);
        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["data"], json!({"msgId": 1}));
    }

    #[test]
    fn classify_backend_started() {
        let msg = InboundMessage::classify(json!({"feedback": "backend_started"}));
        assert_eq!(msg, InboundMessage::BackendStarted);
    }

    #[test]
    fn classify_log_message() {
        let msg = InboundMessage::classify(json!({
            "feedback": "log_message",
            "level": "info",
            "payload": "discovery started"
        }));
        assert_eq!(
            msg,
            InboundMessage::LogMessage {
                level: Some("info".to_string()),
                message: "discovery started".to_string(),
            }
        );
    }

    #[test]
    fn classify_event_with_extra_fields() {
        let msg = InboundMessage::classify(json!({
            "feedback": "FoundDevice",
            "data": {"device_info": {"device_id": "abc"}},
            "source": "mdns"
        }));

        let InboundMessage::Event(event) = msg else {
            panic!("expected event");
        };
        assert_eq!(event.kind(), FeedbackKind::FoundDevice);
        assert_eq!(event.data["device_info"]["device_id"], "abc");
        assert_eq!(event.extra["source"], "mdns");
    }

    #[test]
    fn classify_response_strips_msg_id() {
        let msg = InboundMessage::classify(json!({"data": {"msgId": 3, "status": "ok"}}));
        assert_eq!(
            msg,
            InboundMessage::Response {
                msg_id: 3,
                data: json!({"status": "ok"}),
            }
        );
    }

    #[test]
    fn classify_rejects_idless_frames() {
        let msg = InboundMessage::classify(json!({"data": {"status": "ok"}}));
        assert!(matches!(msg, InboundMessage::Malformed(_)));

        let msg = InboundMessage::classify(json!({"something": "else"}));
        assert!(matches!(msg, InboundMessage::Malformed(_)));
    }

    #[test]
    fn classify_rejects_non_integer_msg_id() {
        let msg = InboundMessage::classify(json!({"data": {"msgId": "three"}}));
        assert!(matches!(msg, InboundMessage::Malformed(_)));
    }
}
