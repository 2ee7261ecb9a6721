//! Dispatch lifecycle engine.
//!
//! Orchestrates store mutations and publishes the resulting integration
//! events. Publishing is best-effort and happens after the store commit; a
//! failed publish never rolls back or fails the operation.

use chrono::Utc;
use tracing::{info, warn};

use siren_core::{AssignmentId, DispatchError, DispatchResult, IncidentId, OrderId, UnitId, UserId};
use siren_events::contracts::{DispatchEvent, IncidentEventData};
use siren_events::{EventPublisher, Transport};

use crate::assignment::{AssignmentStatus, DispatchAssignment};
use crate::incident_cache::IncidentCache;
use crate::order::{DispatchOrder, DispatchStatus};
use crate::store::{DispatchStore, TransitionOutcome, UnitFilter, UnitPatch};
use crate::unit::{Unit, UnitType};

/// Outcome of syncing an `IncidentUpdated` payload into local state.
#[derive(Debug, PartialEq, Eq)]
pub enum IncidentSync {
    /// No cached row for the incident; nothing was changed.
    UnknownIncident,
    Synced {
        notes_appended: usize,
    },
}

pub struct DispatchEngine<S: DispatchStore, T: Transport> {
    store: S,
    publisher: EventPublisher<T>,
}

impl<S: DispatchStore, T: Transport> DispatchEngine<S, T> {
    pub fn new(store: S, publisher: EventPublisher<T>) -> Self {
        Self { store, publisher }
    }

    // Units

    pub fn create_unit(&self, code: &str, unit_type: UnitType) -> DispatchResult<Unit> {
        let code = code.trim();
        if code.is_empty() {
            return Err(DispatchError::validation("unit code must not be empty"));
        }
        let unit = self.store.insert_unit(Unit::new(code, unit_type))?;
        info!(unit_id = %unit.id, code = %unit.code, "created unit");
        Ok(unit)
    }

    pub fn update_unit(&self, id: UnitId, patch: UnitPatch) -> DispatchResult<Unit> {
        if let Some(code) = &patch.code {
            if code.trim().is_empty() {
                return Err(DispatchError::validation("unit code must not be empty"));
            }
        }
        self.store.update_unit(id, patch)
    }

    pub fn unit(&self, id: UnitId) -> DispatchResult<Unit> {
        self.store.get_unit(id)
    }

    pub fn units(&self, filter: &UnitFilter) -> DispatchResult<Vec<Unit>> {
        self.store.list_units(filter)
    }

    // Orders

    /// Creates the (single) dispatch order for an incident and announces it.
    pub fn create_order(
        &self,
        incident_id: IncidentId,
        notes: Vec<String>,
    ) -> DispatchResult<DispatchOrder> {
        let order = self
            .store
            .insert_order(DispatchOrder::new(incident_id, notes, Utc::now()))?;
        info!(order_id = %order.id, incident_id = %incident_id, "created dispatch order");
        self.publisher.publish(&DispatchEvent::OrderCreated {
            order_id: order.id,
            incident_id,
            created_by: self.incident_creator(incident_id),
        });
        Ok(order)
    }

    pub fn order(&self, id: OrderId) -> DispatchResult<DispatchOrder> {
        self.store.get_order(id)
    }

    pub fn orders(&self, status: Option<DispatchStatus>) -> DispatchResult<Vec<DispatchOrder>> {
        self.store.list_orders(status)
    }

    pub fn order_by_incident(&self, incident_id: IncidentId) -> DispatchResult<DispatchOrder> {
        self.store.get_order_by_incident(incident_id)
    }

    pub fn append_order_notes(
        &self,
        order_id: OrderId,
        notes: &[String],
    ) -> DispatchResult<DispatchOrder> {
        self.store.append_order_notes(order_id, notes)
    }

    // Assignments

    pub fn assign_unit(
        &self,
        order_id: OrderId,
        unit_id: UnitId,
    ) -> DispatchResult<DispatchAssignment> {
        let assignment = self.store.create_assignment(order_id, unit_id, Utc::now())?;
        let order = self.store.get_order(order_id)?;
        info!(
            assignment_id = %assignment.id,
            order_id = %order_id,
            unit_id = %unit_id,
            "assigned unit"
        );
        self.publisher.publish(&DispatchEvent::AssignmentCreated {
            assignment_id: assignment.id,
            order_id,
            incident_id: order.incident_id,
            created_by: self.incident_creator(order.incident_id),
            assignment_status: assignment.status.wire_code().to_string(),
        });
        Ok(assignment)
    }

    pub fn transition_assignment(
        &self,
        id: AssignmentId,
        next: AssignmentStatus,
    ) -> DispatchResult<TransitionOutcome> {
        let outcome = self.store.transition_assignment(id, next, Utc::now())?;
        info!(
            assignment_id = %id,
            status = ?next,
            order_completed = outcome.order_completed,
            "assignment transitioned"
        );

        let created_by = self.incident_creator(outcome.incident_id);
        if next == AssignmentStatus::Completed {
            self.publisher.publish(&DispatchEvent::AssignmentCompleted {
                assignment_id: id,
                order_id: outcome.order_id,
                incident_id: outcome.incident_id,
                created_by,
                assignment_status: next.wire_code().to_string(),
            });
        }
        if outcome.order_completed {
            self.publisher.publish(&DispatchEvent::OrderCompleted {
                order_id: outcome.order_id,
                incident_id: outcome.incident_id,
                created_by,
            });
        }
        Ok(outcome)
    }

    pub fn assignment(&self, id: AssignmentId) -> DispatchResult<DispatchAssignment> {
        self.store.get_assignment(id)
    }

    pub fn assignments_for_order(
        &self,
        order_id: OrderId,
    ) -> DispatchResult<Vec<DispatchAssignment>> {
        self.store.list_assignments_for_order(order_id)
    }

    // Incident projection

    /// Caches an `IncidentCreated` payload. Returns false when the incident
    /// was already cached (redelivery).
    pub fn cache_incident(&self, data: &IncidentEventData) -> DispatchResult<bool> {
        let incident = IncidentCache::from_created(data, Utc::now())?;
        let inserted = self.store.insert_incident_if_absent(incident)?;
        if !inserted {
            info!(incident_id = %data.id, "incident already cached");
        }
        Ok(inserted)
    }

    /// Merges an `IncidentUpdated` payload into the cache and appends notes
    /// derived from changed fields to the incident's order, if it has one and
    /// the order is still open.
    pub fn sync_incident(&self, data: &IncidentEventData) -> DispatchResult<IncidentSync> {
        let incident_id: IncidentId = data.id.parse()?;
        let Some(mut incident) = self.store.get_incident(incident_id)? else {
            return Ok(IncidentSync::UnknownIncident);
        };

        let notes = incident.merge(data, Utc::now());
        self.store.upsert_incident(incident)?;

        if notes.is_empty() {
            return Ok(IncidentSync::Synced { notes_appended: 0 });
        }
        match self.store.get_order_by_incident(incident_id) {
            Ok(order) if !order.is_terminal() => {
                self.store.append_order_notes(order.id, &notes)?;
                Ok(IncidentSync::Synced {
                    notes_appended: notes.len(),
                })
            }
            Ok(_) | Err(DispatchError::NotFound(_)) => {
                Ok(IncidentSync::Synced { notes_appended: 0 })
            }
            Err(err) => Err(err),
        }
    }

    pub fn incident(&self, id: IncidentId) -> DispatchResult<Option<IncidentCache>> {
        self.store.get_incident(id)
    }

    fn incident_creator(&self, incident_id: IncidentId) -> Option<UserId> {
        match self.store.get_incident(incident_id) {
            Ok(Some(incident)) => incident.created_by_user_id,
            Ok(None) => None,
            Err(err) => {
                warn!(incident_id = %incident_id, error = %err, "incident cache lookup failed");
                None
            }
        }
    }
}
