//! Outer transport envelope.
//!
//! Topic fan-out wraps every message the way SNS-style brokers do: the inner
//! event travels as a JSON string inside a generic envelope. Consumers unwrap
//! the envelope first, then decode the inner [`EventMessage`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::EventMessage;

/// Generic envelope wrapped around every queued message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    /// JSON-encoded inner [`EventMessage`].
    pub message: String,
    pub topic_arn: String,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid envelope: {0}")]
    Envelope(serde_json::Error),
    #[error("envelope has empty message body")]
    EmptyMessage,
    #[error("invalid inner event: {0}")]
    Event(serde_json::Error),
}

impl TransportEnvelope {
    /// Wrap an already-serialized event message for delivery from a topic.
    pub fn notification(topic_arn: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: "Notification".to_string(),
            message: message.into(),
            topic_arn: topic_arn.into(),
        }
    }

    /// Parse a raw queue message body into the inner typed event.
    pub fn open(body: &str) -> Result<EventMessage, EnvelopeError> {
        let envelope: TransportEnvelope =
            serde_json::from_str(body).map_err(EnvelopeError::Envelope)?;
        if envelope.message.is_empty() {
            return Err(EnvelopeError::EmptyMessage);
        }
        serde_json::from_str(&envelope.message).map_err(EnvelopeError::Event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn open_unwraps_inner_event() {
        let inner = EventMessage::new(
            "DispatchOrderCreated",
            Utc::now(),
            &serde_json::json!({"dispatchOrderId": "o1"}),
        )
        .unwrap();
        let envelope = TransportEnvelope::notification(
            "arn:siren:dispatch-events",
            serde_json::to_string(&inner).unwrap(),
        );
        let body = serde_json::to_string(&envelope).unwrap();

        let opened = TransportEnvelope::open(&body).unwrap();
        assert_eq!(opened.event_type, "DispatchOrderCreated");
        assert_eq!(opened.data["dispatchOrderId"], "o1");
    }

    #[test]
    fn open_rejects_empty_message() {
        let envelope = TransportEnvelope::notification("arn", "");
        let body = serde_json::to_string(&envelope).unwrap();
        assert!(matches!(
            TransportEnvelope::open(&body),
            Err(EnvelopeError::EmptyMessage)
        ));
    }

    #[test]
    fn open_rejects_garbage() {
        assert!(matches!(
            TransportEnvelope::open("not json"),
            Err(EnvelopeError::Envelope(_))
        ));
    }
}
