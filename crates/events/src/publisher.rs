//! Best-effort event publication.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::channel::{ChannelError, Transport};
use crate::message::IntegrationEvent;

/// Publishes one event family to one named topic.
///
/// Publication is **fire-and-forget**: the local transaction that produced the
/// event has already committed, so failures here are logged and swallowed —
/// they must never surface to the caller. Recovery from a dropped publish
/// relies on a later event re-establishing the same end state (an accepted
/// consistency gap, not a bug).
#[derive(Debug, Clone)]
pub struct EventPublisher<T: Transport> {
    transport: Arc<T>,
    topic: String,
}

impl<T: Transport> EventPublisher<T> {
    pub fn new(transport: Arc<T>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish an event: resolve the topic (create if absent), serialize with
    /// stable field names, attempt delivery once.
    ///
    /// Never returns an error.
    pub fn publish(&self, event: &impl IntegrationEvent) {
        let event_type = event.event_type();
        match self.try_publish(event) {
            Ok(()) => {
                info!(topic = %self.topic, event_type, "published event");
            }
            Err(err) => {
                error!(topic = %self.topic, event_type, error = %err, "failed to publish event");
            }
        }
    }

    fn try_publish(&self, event: &impl IntegrationEvent) -> Result<(), ChannelError> {
        if !self.transport.topic_exists(&self.topic)? {
            warn!(topic = %self.topic, "topic not found, attempting to create it");
            self.transport.create_topic(&self.topic)?;
        }

        let message = event.to_message(Utc::now())?;
        let body = serde_json::to_string(&message)?;
        self.transport.publish(&self.topic, event.event_type(), &body)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use siren_core::{IncidentId, OrderId};

    use super::*;
    use crate::channel::QueueChannel;
    use crate::contracts::DispatchEvent;
    use crate::envelope::TransportEnvelope;
    use crate::in_memory::InMemoryTransport;

    fn order_created() -> DispatchEvent {
        DispatchEvent::OrderCreated {
            order_id: OrderId::new(),
            incident_id: IncidentId::new(),
            created_by: None,
        }
    }

    #[test]
    fn publish_creates_missing_topic() {
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = EventPublisher::new(transport.clone(), "dispatch-events");

        assert!(!transport.topic_exists("dispatch-events").unwrap());
        publisher.publish(&order_created());
        assert!(transport.topic_exists("dispatch-events").unwrap());
    }

    #[test]
    fn published_message_is_enveloped() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.create_topic("dispatch-events").unwrap();
        transport.create_queue("q");
        transport.subscribe("dispatch-events", "q").unwrap();

        let publisher = EventPublisher::new(transport.clone(), "dispatch-events");
        publisher.publish(&order_created());

        let queue = transport.queue("q").unwrap();
        let batch = queue.receive(1, Duration::from_millis(10)).unwrap();
        let inner = TransportEnvelope::open(&batch[0].body).unwrap();
        assert_eq!(inner.event_type, "DispatchOrderCreated");
    }

    #[test]
    fn publish_swallows_transport_failures() {
        // Nothing subscribed, nothing provisioned; publish must still return.
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = EventPublisher::new(transport, "dispatch-events");
        publisher.publish(&order_created());
    }
}
