//! Topic/queue topology.
//!
//! Names match the deployed broker resources; each one can be overridden
//! through the environment (e.g. `SIREN_DISPATCH_EVENTS_TOPIC`).

use siren_events::InMemoryTransport;

/// The fixed fan-out between the three services.
///
/// Dispatch publishes to one topic consumed by Incident and Notification;
/// Incident publishes created/updated on separate topics so each consumer
/// subscribes to exactly the family it handles.
#[derive(Debug, Clone)]
pub struct Topology {
    pub dispatch_events_topic: String,
    pub incident_created_topic: String,
    pub incident_updated_topic: String,

    /// Dispatch service: incident projection feeds.
    pub dispatch_incident_queue: String,
    pub dispatch_incident_updated_queue: String,
    /// Incident service: status ladder feed.
    pub incident_dispatch_queue: String,
    /// Notification service feeds.
    pub notification_dispatch_queue: String,
    pub notification_incident_queue: String,
    pub notification_incident_updated_queue: String,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            dispatch_events_topic: "dispatch-events-topic".into(),
            incident_created_topic: "incident-created-topic".into(),
            incident_updated_topic: "incident-updated-topic".into(),
            dispatch_incident_queue: "dispatch-incident-queue".into(),
            dispatch_incident_updated_queue: "dispatch-incident-updated-queue".into(),
            incident_dispatch_queue: "incident-dispatch-queue".into(),
            notification_dispatch_queue: "notification-dispatch-queue".into(),
            notification_incident_queue: "notification-incident-queue".into(),
            notification_incident_updated_queue: "notification-incident-updated-queue".into(),
        }
    }
}

impl Topology {
    /// Defaults overridden by environment variables where set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dispatch_events_topic: env_or("SIREN_DISPATCH_EVENTS_TOPIC", defaults.dispatch_events_topic),
            incident_created_topic: env_or("SIREN_INCIDENT_CREATED_TOPIC", defaults.incident_created_topic),
            incident_updated_topic: env_or("SIREN_INCIDENT_UPDATED_TOPIC", defaults.incident_updated_topic),
            dispatch_incident_queue: env_or("SIREN_DISPATCH_INCIDENT_QUEUE", defaults.dispatch_incident_queue),
            dispatch_incident_updated_queue: env_or(
                "SIREN_DISPATCH_INCIDENT_UPDATED_QUEUE",
                defaults.dispatch_incident_updated_queue,
            ),
            incident_dispatch_queue: env_or("SIREN_INCIDENT_DISPATCH_QUEUE", defaults.incident_dispatch_queue),
            notification_dispatch_queue: env_or(
                "SIREN_NOTIFICATION_DISPATCH_QUEUE",
                defaults.notification_dispatch_queue,
            ),
            notification_incident_queue: env_or(
                "SIREN_NOTIFICATION_INCIDENT_QUEUE",
                defaults.notification_incident_queue,
            ),
            notification_incident_updated_queue: env_or(
                "SIREN_NOTIFICATION_INCIDENT_UPDATED_QUEUE",
                defaults.notification_incident_updated_queue,
            ),
        }
    }

    /// Create every topic, queue, and subscription on the transport.
    ///
    /// Stands in for the broker setup script; consumers still tolerate
    /// queues appearing late (cold-start retry in the consumer loop).
    pub fn provision(&self, transport: &InMemoryTransport) -> Result<(), siren_events::ChannelError> {
        use siren_events::Transport;

        for topic in [
            &self.dispatch_events_topic,
            &self.incident_created_topic,
            &self.incident_updated_topic,
        ] {
            transport.create_topic(topic)?;
        }

        let subscriptions = [
            (&self.incident_created_topic, &self.dispatch_incident_queue),
            (&self.incident_updated_topic, &self.dispatch_incident_updated_queue),
            (&self.dispatch_events_topic, &self.incident_dispatch_queue),
            (&self.dispatch_events_topic, &self.notification_dispatch_queue),
            (&self.incident_created_topic, &self.notification_incident_queue),
            (&self.incident_updated_topic, &self.notification_incident_updated_queue),
        ];
        for (topic, queue) in subscriptions {
            transport.create_queue(queue);
            transport.subscribe(topic, queue)?;
        }
        Ok(())
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}
