//! Composed three-service runtime.
//!
//! One transport, three service cores, six consumer workers. The service
//! handles are the "request side" (what an HTTP layer would call); the
//! workers are the event side.

use std::sync::Arc;
use std::time::Duration;

use siren_dispatch::{DispatchEngine, InMemoryDispatchStore};
use siren_events::{ConsumerConfig, EventPublisher, InMemoryTransport};
use siren_incident::{IncidentService, InMemoryIncidentStore};
use siren_notification::{InMemoryNotificationStore, NotificationService};

use crate::config::Topology;
use crate::workers::{ConsumerWorker, WorkerHandle};

pub type Dispatch = DispatchEngine<InMemoryDispatchStore, InMemoryTransport>;
pub type Incident = IncidentService<InMemoryIncidentStore, InMemoryTransport>;
pub type Notification = NotificationService<InMemoryNotificationStore>;

pub struct SirenRuntime {
    pub dispatch: Arc<Dispatch>,
    pub incident: Arc<Incident>,
    pub notification: Arc<Notification>,
    workers: Vec<WorkerHandle>,
}

impl SirenRuntime {
    /// Provision the topology and start all services and their consumers.
    pub fn start(
        transport: Arc<InMemoryTransport>,
        topology: &Topology,
    ) -> Result<Self, siren_events::ChannelError> {
        Self::start_with_wait(transport, topology, Duration::from_secs(20))
    }

    /// As [`start`](Self::start), with a custom long-poll wait (tests use a
    /// short one so shutdown is immediate).
    pub fn start_with_wait(
        transport: Arc<InMemoryTransport>,
        topology: &Topology,
        wait: Duration,
    ) -> Result<Self, siren_events::ChannelError> {
        topology.provision(&transport)?;

        let dispatch = Arc::new(DispatchEngine::new(
            InMemoryDispatchStore::new(),
            EventPublisher::new(transport.clone(), topology.dispatch_events_topic.clone()),
        ));
        let incident = Arc::new(IncidentService::new(
            InMemoryIncidentStore::new(),
            EventPublisher::new(transport.clone(), topology.incident_created_topic.clone()),
            EventPublisher::new(transport.clone(), topology.incident_updated_topic.clone()),
        ));
        let notification = Arc::new(NotificationService::new(InMemoryNotificationStore::new()));

        let config = |name: &str, queue: &String| {
            ConsumerConfig::new(name.to_string(), queue.clone()).with_wait(wait)
        };

        let mut workers = Vec::new();
        {
            let engine = dispatch.clone();
            workers.push(ConsumerWorker::spawn(
                transport.clone(),
                config("dispatch-incident-created", &topology.dispatch_incident_queue),
                move |msg| siren_dispatch::incident_created_effect(&engine, msg),
            ));
        }
        {
            let engine = dispatch.clone();
            workers.push(ConsumerWorker::spawn(
                transport.clone(),
                config(
                    "dispatch-incident-updated",
                    &topology.dispatch_incident_updated_queue,
                ),
                move |msg| siren_dispatch::incident_updated_effect(&engine, msg),
            ));
        }
        {
            let service = incident.clone();
            workers.push(ConsumerWorker::spawn(
                transport.clone(),
                config("incident-dispatch-events", &topology.incident_dispatch_queue),
                move |msg| siren_incident::dispatch_event_effect(&service, msg),
            ));
        }
        {
            let service = notification.clone();
            workers.push(ConsumerWorker::spawn(
                transport.clone(),
                config(
                    "notification-dispatch-events",
                    &topology.notification_dispatch_queue,
                ),
                move |msg| siren_notification::dispatch_event_effect(&service, msg),
            ));
        }
        {
            let service = notification.clone();
            workers.push(ConsumerWorker::spawn(
                transport.clone(),
                config(
                    "notification-incident-created",
                    &topology.notification_incident_queue,
                ),
                move |msg| siren_notification::incident_created_effect(&service, msg),
            ));
        }
        {
            let service = notification.clone();
            workers.push(ConsumerWorker::spawn(
                transport.clone(),
                config(
                    "notification-incident-updated",
                    &topology.notification_incident_updated_queue,
                ),
                move |msg| siren_notification::incident_updated_effect(&service, msg),
            ));
        }

        Ok(Self {
            dispatch,
            incident,
            notification,
            workers,
        })
    }

    /// Stop every consumer and wait for the threads to finish.
    pub fn shutdown(self) {
        for worker in self.workers {
            worker.shutdown();
        }
    }
}
