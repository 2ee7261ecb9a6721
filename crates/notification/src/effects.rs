//! Consumer-side effects turning events into notification rows.
//!
//! The filters mirror the published contract: `DispatchOrderCompleted` is
//! suppressed (the assignment-completed notification already covers it), and
//! assignment events are only recorded for the wire statuses "1" (assigned)
//! and "4" (completed).

use std::collections::HashMap;
use std::str::FromStr;

use siren_core::{IncidentId, UserId};
use siren_events::contracts::{
    event_type, DispatchEventData, IncidentEventData, ASSIGNMENT_STATUS_ASSIGNED,
    ASSIGNMENT_STATUS_COMPLETED,
};
use siren_events::{EffectError, EffectOutcome, EffectResult, EventMessage};

use crate::notification::NotificationDraft;
use crate::service::NotificationService;
use crate::store::NotificationStore;

/// Effect for the dispatch-events queue.
pub fn dispatch_event_effect<S: NotificationStore>(
    service: &NotificationService<S>,
    message: &EventMessage,
) -> EffectResult {
    match message.event_type.as_str() {
        event_type::DISPATCH_ORDER_CREATED
        | event_type::DISPATCH_ASSIGNMENT_CREATED
        | event_type::DISPATCH_ASSIGNMENT_COMPLETED => {}
        event_type::DISPATCH_ORDER_COMPLETED => {
            return Ok(EffectOutcome::Skipped(
                "order completion already notified via assignment",
            ));
        }
        _ => return Ok(EffectOutcome::Skipped("not a dispatch notification event")),
    }

    let data: DispatchEventData = message.decode().map_err(EffectError::discard)?;
    let incident_id = IncidentId::from_str(&data.incident_id)
        .map_err(|err| EffectError::discard(format!("incident id: {err}")))?;
    let recipient = UserId::from_str(&data.created_by_user_id)
        .map_err(|err| EffectError::discard(format!("recipient id: {err}")))?;

    let assignment_status = data.assignment_status.as_deref().unwrap_or_default();
    let (title, message_text, kind, reference_type, reference_id) =
        match message.event_type.as_str() {
            event_type::DISPATCH_ORDER_CREATED => (
                "Dispatch Order Created",
                format!("A dispatch order has been created for incident {incident_id}."),
                "Order",
                "DispatchOrder",
                data.dispatch_order_id.clone(),
            ),
            event_type::DISPATCH_ASSIGNMENT_CREATED => {
                if assignment_status != ASSIGNMENT_STATUS_ASSIGNED {
                    return Ok(EffectOutcome::Skipped("assignment not in assigned status"));
                }
                (
                    "Unit Assigned",
                    format!("A unit has been assigned to incident {incident_id}."),
                    "Assignment",
                    "DispatchAssignment",
                    data.dispatch_assignment_id.clone().unwrap_or_default(),
                )
            }
            event_type::DISPATCH_ASSIGNMENT_COMPLETED => {
                if assignment_status != ASSIGNMENT_STATUS_COMPLETED {
                    return Ok(EffectOutcome::Skipped("assignment not in completed status"));
                }
                (
                    "Assignment Completed",
                    format!("A unit has completed its assignment for incident {incident_id}."),
                    "Assignment",
                    "DispatchAssignment",
                    data.dispatch_assignment_id.clone().unwrap_or_default(),
                )
            }
            _ => unreachable!("filtered above"),
        };

    let draft = NotificationDraft {
        title: title.to_string(),
        message: message_text,
        category: "Dispatch".into(),
        kind: kind.into(),
        severity: String::new(),
        recipient_type: "User".into(),
        recipient_id: recipient.to_string(),
        reference_type: reference_type.into(),
        reference_id: reference_id.clone(),
        metadata: HashMap::from([
            ("IncidentId".to_string(), incident_id.to_string()),
            ("EventType".to_string(), message.event_type.clone()),
        ]),
    };

    record(service, &format!("{}:{reference_id}", message.event_type), draft)
}

/// Effect for the incident-created queue.
///
/// Only incidents with a known creator produce a notification; there is no
/// one to notify otherwise.
pub fn incident_created_effect<S: NotificationStore>(
    service: &NotificationService<S>,
    message: &EventMessage,
) -> EffectResult {
    if message.event_type != event_type::INCIDENT_CREATED {
        return Err(EffectError::discard(format!(
            "unexpected event type '{}'",
            message.event_type
        )));
    }
    let data: IncidentEventData = message.decode().map_err(EffectError::discard)?;
    let Ok(recipient) = UserId::from_str(&data.created_by_user_id) else {
        return Ok(EffectOutcome::Skipped("incident has no creator to notify"));
    };

    let draft = NotificationDraft {
        title: format!("Incident Reported: {}", data.title),
        message: format!(
            "Incident {} has been reported with severity {}.",
            data.incident_id, data.severity
        ),
        category: "Incident".into(),
        kind: "Create".into(),
        severity: data.severity.clone(),
        recipient_type: "User".into(),
        recipient_id: recipient.to_string(),
        reference_type: "Incident".into(),
        reference_id: data.id.clone(),
        metadata: HashMap::from([
            ("IncidentId".to_string(), data.incident_id.clone()),
            ("EventType".to_string(), event_type::INCIDENT_CREATED.to_string()),
        ]),
    };

    record(
        service,
        &format!("{}:{}", event_type::INCIDENT_CREATED, data.id),
        draft,
    )
}

/// Effect for the incident-updated queue. Broadcast, not user-addressed.
pub fn incident_updated_effect<S: NotificationStore>(
    service: &NotificationService<S>,
    message: &EventMessage,
) -> EffectResult {
    if message.event_type != event_type::INCIDENT_UPDATED {
        return Err(EffectError::discard(format!(
            "unexpected event type '{}'",
            message.event_type
        )));
    }
    let data: IncidentEventData = message.decode().map_err(EffectError::discard)?;

    let draft = NotificationDraft {
        title: format!("Incident Updated: {}", data.title),
        message: format!("The incident {} has been updated.", data.incident_id),
        category: "Incident".into(),
        kind: "Update".into(),
        severity: data.severity.clone(),
        recipient_type: "System".into(),
        recipient_id: "all".into(),
        reference_type: "Incident".into(),
        reference_id: data.id.clone(),
        metadata: HashMap::from([
            ("IncidentId".to_string(), data.incident_id.clone()),
            ("EventType".to_string(), event_type::INCIDENT_UPDATED.to_string()),
        ]),
    };

    // Distinct updates to one incident must each notify, so the key includes
    // the changed content, not just the incident id. An identical redelivery
    // still collapses onto the same key.
    let dedup_key = format!(
        "{}:{}:{}:{}:{}",
        event_type::INCIDENT_UPDATED,
        data.id,
        data.status,
        data.severity,
        data.title,
    );
    record(service, &dedup_key, draft)
}

fn record<S: NotificationStore>(
    service: &NotificationService<S>,
    dedup_key: &str,
    draft: NotificationDraft,
) -> EffectResult {
    match service.record(dedup_key, draft) {
        Ok(Some(_)) => Ok(EffectOutcome::Applied),
        Ok(None) => Ok(EffectOutcome::Skipped("notification already recorded")),
        Err(err) if err.is_retryable() => Err(EffectError::retry(err)),
        Err(err) => Err(EffectError::discard(err)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use siren_core::{AssignmentId, OrderId};

    use super::*;
    use crate::store::InMemoryNotificationStore;

    fn service() -> NotificationService<InMemoryNotificationStore> {
        NotificationService::new(InMemoryNotificationStore::new())
    }

    fn dispatch_message(
        event_type: &str,
        assignment_id: Option<AssignmentId>,
        assignment_status: Option<&str>,
    ) -> EventMessage {
        let data = DispatchEventData {
            dispatch_order_id: OrderId::new().to_string(),
            incident_id: IncidentId::new().to_string(),
            created_by_user_id: UserId::new().to_string(),
            dispatch_assignment_id: assignment_id.map(|id| id.to_string()),
            assignment_status: assignment_status.map(str::to_string),
        };
        EventMessage::new(event_type, Utc::now(), &data).unwrap()
    }

    #[test]
    fn assignment_created_records_once() {
        let service = service();
        let message = dispatch_message(
            event_type::DISPATCH_ASSIGNMENT_CREATED,
            Some(AssignmentId::new()),
            Some("1"),
        );

        assert_eq!(
            dispatch_event_effect(&service, &message).unwrap(),
            EffectOutcome::Applied
        );
        assert_eq!(
            dispatch_event_effect(&service, &message).unwrap(),
            EffectOutcome::Skipped("notification already recorded")
        );

        let rows = service.notifications().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Unit Assigned");
        assert_eq!(rows[0].reference_type, "DispatchAssignment");
    }

    #[test]
    fn order_completed_is_suppressed() {
        let service = service();
        let message = dispatch_message(event_type::DISPATCH_ORDER_COMPLETED, None, None);
        assert_eq!(
            dispatch_event_effect(&service, &message).unwrap(),
            EffectOutcome::Skipped("order completion already notified via assignment")
        );
        assert!(service.notifications().unwrap().is_empty());
    }

    #[test]
    fn assignment_events_filter_on_wire_status() {
        let service = service();
        // Created with a non-assigned status: filtered.
        let message = dispatch_message(
            event_type::DISPATCH_ASSIGNMENT_CREATED,
            Some(AssignmentId::new()),
            Some("2"),
        );
        assert!(matches!(
            dispatch_event_effect(&service, &message).unwrap(),
            EffectOutcome::Skipped(_)
        ));
        // Completed with the completed status: recorded.
        let message = dispatch_message(
            event_type::DISPATCH_ASSIGNMENT_COMPLETED,
            Some(AssignmentId::new()),
            Some("4"),
        );
        assert_eq!(
            dispatch_event_effect(&service, &message).unwrap(),
            EffectOutcome::Applied
        );
    }

    #[test]
    fn missing_recipient_is_discarded() {
        let service = service();
        let data = DispatchEventData {
            dispatch_order_id: OrderId::new().to_string(),
            incident_id: IncidentId::new().to_string(),
            ..Default::default()
        };
        let message =
            EventMessage::new(event_type::DISPATCH_ORDER_CREATED, Utc::now(), &data).unwrap();
        assert!(matches!(
            dispatch_event_effect(&service, &message),
            Err(EffectError::Discard(_))
        ));
    }

    #[test]
    fn incident_created_without_creator_is_skipped() {
        let service = service();
        let data = IncidentEventData {
            id: IncidentId::new().to_string(),
            incident_id: "INC-1".into(),
            title: "Gas leak".into(),
            ..Default::default()
        };
        let message = EventMessage::new(event_type::INCIDENT_CREATED, Utc::now(), &data).unwrap();
        assert_eq!(
            incident_created_effect(&service, &message).unwrap(),
            EffectOutcome::Skipped("incident has no creator to notify")
        );
    }

    #[test]
    fn distinct_incident_updates_each_notify() {
        let service = service();
        let id = IncidentId::new().to_string();
        let mut data = IncidentEventData {
            id: id.clone(),
            incident_id: "INC-1".into(),
            title: "Gas leak".into(),
            severity: "High".into(),
            status: "Acknowledged".into(),
            ..Default::default()
        };

        let first = EventMessage::new(event_type::INCIDENT_UPDATED, Utc::now(), &data).unwrap();
        assert_eq!(
            incident_updated_effect(&service, &first).unwrap(),
            EffectOutcome::Applied
        );
        // Redelivery of the identical update collapses.
        assert_eq!(
            incident_updated_effect(&service, &first).unwrap(),
            EffectOutcome::Skipped("notification already recorded")
        );

        // A genuinely different update records again.
        data.status = "Resolved".into();
        let second = EventMessage::new(event_type::INCIDENT_UPDATED, Utc::now(), &data).unwrap();
        assert_eq!(
            incident_updated_effect(&service, &second).unwrap(),
            EffectOutcome::Applied
        );
        assert_eq!(service.notifications().unwrap().len(), 2);
    }
}
