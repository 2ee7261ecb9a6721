//! Dispatch orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siren_core::{IncidentId, OrderId};

/// Order lifecycle status. Transitions are forward-only:
/// `Created → InProgress → Completed`, with `Cancelled` reachable from any
/// non-terminal state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Created,
    InProgress,
    Completed,
    Cancelled,
}

impl DispatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// The unit of work for one incident.
///
/// One order per incident (unique `incident_id`). `notes` is append-only:
/// updates never remove or replace existing entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOrder {
    pub id: OrderId,
    pub incident_id: IncidentId,
    pub status: DispatchStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Vec<String>,
}

impl DispatchOrder {
    pub fn new(incident_id: IncidentId, notes: Vec<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            incident_id,
            status: DispatchStatus::Created,
            created_at,
            completed_at: None,
            notes,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
