//! Typed event message (the inner wire payload).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An integration event as it travels between services.
///
/// Field names are explicit and stable (camelCase, identifiers as strings);
/// consumers in other services must be able to decode this without sharing
/// our in-process types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: JsonValue,
}

impl EventMessage {
    /// Build a message from a typed payload.
    pub fn new(
        event_type: impl Into<String>,
        timestamp: DateTime<Utc>,
        data: &impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event_type.into(),
            timestamp,
            data: serde_json::to_value(data)?,
        })
    }

    /// Decode the payload into a typed contract struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// An outbound domain event, ready to be published.
///
/// Implemented by the per-service event enums in [`crate::contracts`]; the
/// publisher only needs the routing tag and the serialized message.
pub trait IntegrationEvent: core::fmt::Debug {
    /// Stable event-type tag (e.g. "DispatchOrderCreated"), used as routing
    /// metadata and as the discriminator inside the message body.
    fn event_type(&self) -> &'static str;

    /// Render the wire message, stamping the given publication time.
    fn to_message(&self, timestamp: DateTime<Utc>) -> Result<EventMessage, serde_json::Error>;
}
