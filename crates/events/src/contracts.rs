//! Cross-service event contracts.
//!
//! These are the only shapes the three services agree on. Identifiers travel
//! as strings; absent/unknown fields decode to defaults so that older and
//! newer producers interoperate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siren_core::{AssignmentId, IncidentId, OrderId, UserId};

use crate::message::{EventMessage, IntegrationEvent};

/// Event-type tags used as routing metadata and in-message discriminators.
pub mod event_type {
    pub const DISPATCH_ORDER_CREATED: &str = "DispatchOrderCreated";
    pub const DISPATCH_ASSIGNMENT_CREATED: &str = "DispatchAssignmentCreated";
    pub const DISPATCH_ASSIGNMENT_COMPLETED: &str = "DispatchAssignmentCompleted";
    pub const DISPATCH_ORDER_COMPLETED: &str = "DispatchOrderCompleted";
    pub const INCIDENT_CREATED: &str = "IncidentCreated";
    pub const INCIDENT_UPDATED: &str = "IncidentUpdated";
}

/// Wire encoding of an assignment status.
///
/// The numeric string values are part of the published contract ("1" =
/// assigned, "4" = completed); consumers filter on them.
pub const ASSIGNMENT_STATUS_ASSIGNED: &str = "1";
pub const ASSIGNMENT_STATUS_COMPLETED: &str = "4";

/// Payload of every `Dispatch*` event.
///
/// Assignment fields are only present on assignment events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchEventData {
    pub dispatch_order_id: String,
    pub incident_id: String,
    pub created_by_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_assignment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_status: Option<String>,
}

/// Payload of `IncidentCreated` / `IncidentUpdated`.
///
/// On updates any subset of fields may be empty/zero; consumers treat empty
/// strings and zero coordinates as "unchanged".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncidentEventData {
    /// Incident aggregate id (UUID string).
    pub id: String,
    /// Human-facing incident code (e.g. "INC-4F2A").
    pub incident_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub category: String,
    pub severity: String,
    pub status: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_by_user_id: String,
}

/// Events published by the Dispatch service.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    OrderCreated {
        order_id: OrderId,
        incident_id: IncidentId,
        created_by: Option<UserId>,
    },
    AssignmentCreated {
        assignment_id: AssignmentId,
        order_id: OrderId,
        incident_id: IncidentId,
        created_by: Option<UserId>,
        /// Numeric wire encoding of the assignment's status ("1".."6").
        assignment_status: String,
    },
    AssignmentCompleted {
        assignment_id: AssignmentId,
        order_id: OrderId,
        incident_id: IncidentId,
        created_by: Option<UserId>,
        assignment_status: String,
    },
    OrderCompleted {
        order_id: OrderId,
        incident_id: IncidentId,
        created_by: Option<UserId>,
    },
}

fn user_field(created_by: &Option<UserId>) -> String {
    created_by.map(|u| u.to_string()).unwrap_or_default()
}

impl DispatchEvent {
    fn data(&self) -> DispatchEventData {
        match self {
            Self::OrderCreated {
                order_id,
                incident_id,
                created_by,
            } => DispatchEventData {
                dispatch_order_id: order_id.to_string(),
                incident_id: incident_id.to_string(),
                created_by_user_id: user_field(created_by),
                dispatch_assignment_id: None,
                assignment_status: None,
            },
            Self::AssignmentCreated {
                assignment_id,
                order_id,
                incident_id,
                created_by,
                assignment_status,
            }
            | Self::AssignmentCompleted {
                assignment_id,
                order_id,
                incident_id,
                created_by,
                assignment_status,
            } => DispatchEventData {
                dispatch_order_id: order_id.to_string(),
                incident_id: incident_id.to_string(),
                created_by_user_id: user_field(created_by),
                dispatch_assignment_id: Some(assignment_id.to_string()),
                assignment_status: Some(assignment_status.clone()),
            },
            Self::OrderCompleted {
                order_id,
                incident_id,
                created_by,
            } => DispatchEventData {
                dispatch_order_id: order_id.to_string(),
                incident_id: incident_id.to_string(),
                created_by_user_id: user_field(created_by),
                dispatch_assignment_id: None,
                assignment_status: None,
            },
        }
    }
}

impl IntegrationEvent for DispatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => event_type::DISPATCH_ORDER_CREATED,
            Self::AssignmentCreated { .. } => event_type::DISPATCH_ASSIGNMENT_CREATED,
            Self::AssignmentCompleted { .. } => event_type::DISPATCH_ASSIGNMENT_COMPLETED,
            Self::OrderCompleted { .. } => event_type::DISPATCH_ORDER_COMPLETED,
        }
    }

    fn to_message(&self, timestamp: DateTime<Utc>) -> Result<EventMessage, serde_json::Error> {
        EventMessage::new(self.event_type(), timestamp, &self.data())
    }
}

/// Events published by the Incident service.
#[derive(Debug, Clone, PartialEq)]
pub enum IncidentEvent {
    Created(IncidentEventData),
    Updated(IncidentEventData),
}

impl IntegrationEvent for IncidentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => event_type::INCIDENT_CREATED,
            Self::Updated(_) => event_type::INCIDENT_UPDATED,
        }
    }

    fn to_message(&self, timestamp: DateTime<Utc>) -> Result<EventMessage, serde_json::Error> {
        let (Self::Created(data) | Self::Updated(data)) = self;
        EventMessage::new(self.event_type(), timestamp, data)
    }
}
