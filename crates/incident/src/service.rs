//! Incident service operations.

use chrono::Utc;
use tracing::{debug, info};

use siren_core::{DispatchResult, IncidentId};
use siren_events::contracts::{IncidentEvent, IncidentEventData};
use siren_events::{EventPublisher, Transport};

use crate::incident::{Incident, IncidentPatch, IncidentStatus, NewIncident};
use crate::store::IncidentStore;

pub struct IncidentService<S: IncidentStore, T: Transport> {
    store: S,
    /// `IncidentCreated` and `IncidentUpdated` go out on separate topics, so
    /// downstream services subscribe to exactly the family they handle.
    created_publisher: EventPublisher<T>,
    updated_publisher: EventPublisher<T>,
}

impl<S: IncidentStore, T: Transport> IncidentService<S, T> {
    pub fn new(
        store: S,
        created_publisher: EventPublisher<T>,
        updated_publisher: EventPublisher<T>,
    ) -> Self {
        Self {
            store,
            created_publisher,
            updated_publisher,
        }
    }

    pub fn create_incident(&self, new: NewIncident) -> DispatchResult<Incident> {
        new.validate()?;
        let incident = self.store.insert(Incident::new(new, Utc::now()))?;
        info!(incident_id = %incident.id, code = %incident.code, "created incident");
        self.created_publisher
            .publish(&IncidentEvent::Created(event_data(&incident)));
        Ok(incident)
    }

    pub fn update_incident(&self, id: IncidentId, patch: IncidentPatch) -> DispatchResult<Incident> {
        let incident = self.store.update_with(id, &mut |incident| {
            if let Some(title) = &patch.title {
                incident.title = title.clone();
            }
            if let Some(description) = &patch.description {
                incident.description = Some(description.clone());
            }
            if let Some(category) = patch.category {
                incident.category = category;
            }
            if let Some(severity) = patch.severity {
                incident.severity = severity;
            }
            if let Some(status) = patch.status {
                incident.status = status;
                if status == IncidentStatus::Resolved && incident.resolved_at.is_none() {
                    incident.resolved_at = Some(Utc::now());
                }
            }
            if let Some(latitude) = patch.latitude {
                incident.latitude = latitude;
            }
            if let Some(longitude) = patch.longitude {
                incident.longitude = longitude;
            }
            if let Some(notes) = &patch.resolution_notes {
                incident.resolution_notes = Some(notes.clone());
            }
            Ok(())
        })?;
        info!(incident_id = %id, status = %incident.status, "updated incident");
        self.updated_publisher
            .publish(&IncidentEvent::Updated(event_data(&incident)));
        Ok(incident)
    }

    /// Advances incident status in response to a dispatch event.
    ///
    /// Returns false when `target` would move status backward (or not at
    /// all); the attempt is ignored rather than rejected.
    pub fn apply_dispatch_status(
        &self,
        id: IncidentId,
        target: IncidentStatus,
    ) -> DispatchResult<bool> {
        let mut upgraded = false;
        let incident = self.store.update_with(id, &mut |incident| {
            if incident.status.allows_upgrade_to(target) {
                incident.status = target;
                if target == IncidentStatus::Resolved && incident.resolved_at.is_none() {
                    incident.resolved_at = Some(Utc::now());
                }
                upgraded = true;
            } else {
                debug!(
                    incident_id = %id,
                    current = %incident.status,
                    target = %target,
                    "ignoring non-forward status change"
                );
            }
            Ok(())
        })?;

        if upgraded {
            info!(incident_id = %id, status = %target, "incident status advanced");
            self.updated_publisher
                .publish(&IncidentEvent::Updated(event_data(&incident)));
        }
        Ok(upgraded)
    }

    pub fn incident(&self, id: IncidentId) -> DispatchResult<Incident> {
        self.store.get(id)
    }

    pub fn incidents(&self, status: Option<IncidentStatus>) -> DispatchResult<Vec<Incident>> {
        self.store.list(status)
    }
}

fn event_data(incident: &Incident) -> IncidentEventData {
    IncidentEventData {
        id: incident.id.to_string(),
        incident_id: incident.code.clone(),
        title: incident.title.clone(),
        category: incident.category.to_string(),
        severity: incident.severity.to_string(),
        status: incident.status.to_string(),
        latitude: incident.latitude,
        longitude: incident.longitude,
        created_by_user_id: incident
            .created_by_user_id
            .map(|u| u.to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use siren_core::UserId;
    use siren_events::{InMemoryTransport, QueueChannel, TransportEnvelope};

    use super::*;
    use crate::incident::{IncidentCategory, Severity};
    use crate::store::InMemoryIncidentStore;

    fn service_with_queues() -> (
        IncidentService<InMemoryIncidentStore, InMemoryTransport>,
        Arc<InMemoryTransport>,
    ) {
        let transport = Arc::new(InMemoryTransport::new());
        for (topic, queue) in [
            ("incident-created-topic", "created-observer"),
            ("incident-updated-topic", "updated-observer"),
        ] {
            transport.create_topic(topic).unwrap();
            transport.create_queue(queue);
            transport.subscribe(topic, queue).unwrap();
        }
        let service = IncidentService::new(
            InMemoryIncidentStore::new(),
            EventPublisher::new(transport.clone(), "incident-created-topic"),
            EventPublisher::new(transport.clone(), "incident-updated-topic"),
        );
        (service, transport)
    }

    fn new_incident() -> NewIncident {
        NewIncident {
            title: "Warehouse fire".into(),
            description: Some("Smoke visible from the street".into()),
            category: IncidentCategory::Fire,
            severity: Severity::Critical,
            latitude: 42.66,
            longitude: 21.17,
            reporter_name: Some("On-scene caller".into()),
            reporter_contact: None,
            created_by_user_id: Some(UserId::new()),
        }
    }

    fn receive_one(transport: &InMemoryTransport, queue: &str) -> siren_events::EventMessage {
        let queue = transport.queue(queue).unwrap();
        let batch = queue.receive(1, Duration::from_millis(10)).unwrap();
        assert_eq!(batch.len(), 1);
        queue.delete(&batch[0].receipt).unwrap();
        TransportEnvelope::open(&batch[0].body).unwrap()
    }

    #[test]
    fn create_publishes_incident_created() {
        let (service, transport) = service_with_queues();
        let incident = service.create_incident(new_incident()).unwrap();
        assert_eq!(incident.status, IncidentStatus::Created);

        let msg = receive_one(&transport, "created-observer");
        assert_eq!(msg.event_type, "IncidentCreated");
        assert_eq!(msg.data["id"], incident.id.to_string());
        assert_eq!(msg.data["incidentId"], incident.code);
        assert_eq!(msg.data["type"], "Fire");
        assert_eq!(msg.data["status"], "Created");
    }

    #[test]
    fn update_publishes_incident_updated() {
        let (service, transport) = service_with_queues();
        let incident = service.create_incident(new_incident()).unwrap();
        receive_one(&transport, "created-observer");

        let updated = service
            .update_incident(
                incident.id,
                IncidentPatch {
                    severity: Some(Severity::High),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.severity, Severity::High);

        let msg = receive_one(&transport, "updated-observer");
        assert_eq!(msg.event_type, "IncidentUpdated");
        assert_eq!(msg.data["severity"], "High");
    }

    #[test]
    fn dispatch_status_upgrades_are_forward_only() {
        let (service, transport) = service_with_queues();
        let incident = service.create_incident(new_incident()).unwrap();

        assert!(service
            .apply_dispatch_status(incident.id, IncidentStatus::InProgress)
            .unwrap());
        // A late DispatchOrderCreated must not move the status back.
        assert!(!service
            .apply_dispatch_status(incident.id, IncidentStatus::Acknowledged)
            .unwrap());
        assert_eq!(
            service.incident(incident.id).unwrap().status,
            IncidentStatus::InProgress
        );

        // Only the applied upgrade published an update.
        let msg = receive_one(&transport, "updated-observer");
        assert_eq!(msg.data["status"], "InProgress");
        let queue = transport.queue("updated-observer").unwrap();
        assert!(queue
            .receive(1, Duration::from_millis(10))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn resolving_stamps_resolved_at() {
        let (service, _) = service_with_queues();
        let incident = service.create_incident(new_incident()).unwrap();
        service
            .apply_dispatch_status(incident.id, IncidentStatus::Resolved)
            .unwrap();
        let incident = service.incident(incident.id).unwrap();
        assert!(incident.is_resolved());
        assert!(incident.resolved_at.is_some());
    }

    #[test]
    fn create_rejects_invalid_input() {
        let (service, _) = service_with_queues();
        let mut bad = new_incident();
        bad.title = String::new();
        assert!(service.create_incident(bad).is_err());
    }
}
