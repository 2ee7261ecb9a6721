//! Dispatch persistence.
//!
//! The store exposes composite mutations (`create_assignment`,
//! `transition_assignment`) rather than raw row updates so that every
//! lifecycle invariant is checked and applied under a single lock. Two
//! concurrent assigns for the same unit race to exactly one winner.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use siren_core::{AssignmentId, DispatchError, DispatchResult, IncidentId, OrderId, UnitId};

use crate::assignment::{AssignmentStatus, DispatchAssignment};
use crate::incident_cache::IncidentCache;
use crate::order::{DispatchOrder, DispatchStatus};
use crate::unit::{Unit, UnitStatus, UnitType};

/// Optional listing filters for units.
#[derive(Debug, Default, Clone)]
pub struct UnitFilter {
    pub unit_type: Option<UnitType>,
    pub status: Option<UnitStatus>,
}

/// Fields a caller may change on an existing unit.
///
/// Status is deliberately absent except for the out-of-service flag; the
/// lifecycle derives unit status from assignments.
#[derive(Debug, Default, Clone)]
pub struct UnitPatch {
    pub code: Option<String>,
    pub unit_type: Option<UnitType>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub out_of_service: Option<bool>,
}

/// Result of a successful assignment transition, captured while the lock was
/// held so callers can publish events from consistent data.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub assignment: DispatchAssignment,
    pub order_id: OrderId,
    pub incident_id: IncidentId,
    /// True when this transition terminated the order's last active
    /// assignment and the order rolled up to `Completed`.
    pub order_completed: bool,
}

/// Storage abstraction for the Dispatch service.
pub trait DispatchStore: Send + Sync {
    // Units
    fn insert_unit(&self, unit: Unit) -> DispatchResult<Unit>;
    fn update_unit(&self, id: UnitId, patch: UnitPatch) -> DispatchResult<Unit>;
    fn get_unit(&self, id: UnitId) -> DispatchResult<Unit>;
    fn list_units(&self, filter: &UnitFilter) -> DispatchResult<Vec<Unit>>;

    // Orders
    fn insert_order(&self, order: DispatchOrder) -> DispatchResult<DispatchOrder>;
    fn get_order(&self, id: OrderId) -> DispatchResult<DispatchOrder>;
    fn get_order_by_incident(&self, incident_id: IncidentId) -> DispatchResult<DispatchOrder>;
    fn list_orders(&self, status: Option<DispatchStatus>) -> DispatchResult<Vec<DispatchOrder>>;
    fn append_order_notes(&self, id: OrderId, notes: &[String]) -> DispatchResult<DispatchOrder>;

    // Assignments
    fn create_assignment(
        &self,
        order_id: OrderId,
        unit_id: UnitId,
        assigned_at: DateTime<Utc>,
    ) -> DispatchResult<DispatchAssignment>;
    fn transition_assignment(
        &self,
        id: AssignmentId,
        next: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> DispatchResult<TransitionOutcome>;
    fn get_assignment(&self, id: AssignmentId) -> DispatchResult<DispatchAssignment>;
    fn list_assignments_for_order(&self, order_id: OrderId)
    -> DispatchResult<Vec<DispatchAssignment>>;

    // Incident projection
    fn upsert_incident(&self, incident: IncidentCache) -> DispatchResult<()>;
    fn insert_incident_if_absent(&self, incident: IncidentCache) -> DispatchResult<bool>;
    fn get_incident(&self, id: IncidentId) -> DispatchResult<Option<IncidentCache>>;
}

impl<S: DispatchStore + ?Sized> DispatchStore for Arc<S> {
    fn insert_unit(&self, unit: Unit) -> DispatchResult<Unit> {
        (**self).insert_unit(unit)
    }
    fn update_unit(&self, id: UnitId, patch: UnitPatch) -> DispatchResult<Unit> {
        (**self).update_unit(id, patch)
    }
    fn get_unit(&self, id: UnitId) -> DispatchResult<Unit> {
        (**self).get_unit(id)
    }
    fn list_units(&self, filter: &UnitFilter) -> DispatchResult<Vec<Unit>> {
        (**self).list_units(filter)
    }
    fn insert_order(&self, order: DispatchOrder) -> DispatchResult<DispatchOrder> {
        (**self).insert_order(order)
    }
    fn get_order(&self, id: OrderId) -> DispatchResult<DispatchOrder> {
        (**self).get_order(id)
    }
    fn get_order_by_incident(&self, incident_id: IncidentId) -> DispatchResult<DispatchOrder> {
        (**self).get_order_by_incident(incident_id)
    }
    fn list_orders(&self, status: Option<DispatchStatus>) -> DispatchResult<Vec<DispatchOrder>> {
        (**self).list_orders(status)
    }
    fn append_order_notes(&self, id: OrderId, notes: &[String]) -> DispatchResult<DispatchOrder> {
        (**self).append_order_notes(id, notes)
    }
    fn create_assignment(
        &self,
        order_id: OrderId,
        unit_id: UnitId,
        assigned_at: DateTime<Utc>,
    ) -> DispatchResult<DispatchAssignment> {
        (**self).create_assignment(order_id, unit_id, assigned_at)
    }
    fn transition_assignment(
        &self,
        id: AssignmentId,
        next: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> DispatchResult<TransitionOutcome> {
        (**self).transition_assignment(id, next, at)
    }
    fn get_assignment(&self, id: AssignmentId) -> DispatchResult<DispatchAssignment> {
        (**self).get_assignment(id)
    }
    fn list_assignments_for_order(
        &self,
        order_id: OrderId,
    ) -> DispatchResult<Vec<DispatchAssignment>> {
        (**self).list_assignments_for_order(order_id)
    }
    fn upsert_incident(&self, incident: IncidentCache) -> DispatchResult<()> {
        (**self).upsert_incident(incident)
    }
    fn insert_incident_if_absent(&self, incident: IncidentCache) -> DispatchResult<bool> {
        (**self).insert_incident_if_absent(incident)
    }
    fn get_incident(&self, id: IncidentId) -> DispatchResult<Option<IncidentCache>> {
        (**self).get_incident(id)
    }
}

#[derive(Default)]
struct Tables {
    units: HashMap<UnitId, Unit>,
    orders: HashMap<OrderId, DispatchOrder>,
    orders_by_incident: HashMap<IncidentId, OrderId>,
    assignments: HashMap<AssignmentId, DispatchAssignment>,
    incidents: HashMap<IncidentId, IncidentCache>,
}

/// In-memory store. All composite checks happen inside one write lock.
#[derive(Default)]
pub struct InMemoryDispatchStore {
    tables: RwLock<Tables>,
}

impl InMemoryDispatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DispatchStore for InMemoryDispatchStore {
    fn insert_unit(&self, unit: Unit) -> DispatchResult<Unit> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;
        if tables.units.values().any(|u| u.code == unit.code) {
            return Err(DispatchError::duplicate(format!(
                "unit code '{}' already exists",
                unit.code
            )));
        }
        tables.units.insert(unit.id, unit.clone());
        Ok(unit)
    }

    fn update_unit(&self, id: UnitId, patch: UnitPatch) -> DispatchResult<Unit> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;
        if let Some(code) = &patch.code {
            if tables.units.values().any(|u| u.id != id && u.code == *code) {
                return Err(DispatchError::duplicate(format!(
                    "unit code '{code}' already exists"
                )));
            }
        }
        let unit = tables
            .units
            .get_mut(&id)
            .ok_or_else(|| DispatchError::not_found(format!("unit {id}")))?;
        if let Some(code) = patch.code {
            unit.code = code;
        }
        if let Some(unit_type) = patch.unit_type {
            unit.unit_type = unit_type;
        }
        if let Some(latitude) = patch.latitude {
            unit.latitude = Some(latitude);
        }
        if let Some(longitude) = patch.longitude {
            unit.longitude = Some(longitude);
        }
        match patch.out_of_service {
            Some(true) => {
                if unit.status != UnitStatus::Available {
                    return Err(DispatchError::invalid_state(format!(
                        "unit {id} cannot be taken out of service while {:?}",
                        unit.status
                    )));
                }
                unit.status = UnitStatus::Unavailable;
            }
            Some(false) => {
                if unit.status == UnitStatus::Unavailable {
                    unit.status = UnitStatus::Available;
                }
            }
            None => {}
        }
        Ok(unit.clone())
    }

    fn get_unit(&self, id: UnitId) -> DispatchResult<Unit> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        tables
            .units
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(format!("unit {id}")))
    }

    fn list_units(&self, filter: &UnitFilter) -> DispatchResult<Vec<Unit>> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        let mut units: Vec<Unit> = tables
            .units
            .values()
            .filter(|u| filter.unit_type.is_none_or(|t| u.unit_type == t))
            .filter(|u| filter.status.is_none_or(|s| u.status == s))
            .cloned()
            .collect();
        units.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(units)
    }

    fn insert_order(&self, order: DispatchOrder) -> DispatchResult<DispatchOrder> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;
        if tables.orders_by_incident.contains_key(&order.incident_id) {
            return Err(DispatchError::duplicate(format!(
                "incident {} already has a dispatch order",
                order.incident_id
            )));
        }
        tables.orders_by_incident.insert(order.incident_id, order.id);
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    fn get_order(&self, id: OrderId) -> DispatchResult<DispatchOrder> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        tables
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(format!("order {id}")))
    }

    fn get_order_by_incident(&self, incident_id: IncidentId) -> DispatchResult<DispatchOrder> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        tables
            .orders_by_incident
            .get(&incident_id)
            .and_then(|order_id| tables.orders.get(order_id))
            .cloned()
            .ok_or_else(|| {
                DispatchError::not_found(format!("order for incident {incident_id}"))
            })
    }

    fn list_orders(&self, status: Option<DispatchStatus>) -> DispatchResult<Vec<DispatchOrder>> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        let mut orders: Vec<DispatchOrder> = tables
            .orders
            .values()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    fn append_order_notes(&self, id: OrderId, notes: &[String]) -> DispatchResult<DispatchOrder> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| DispatchError::not_found(format!("order {id}")))?;
        if order.is_terminal() {
            return Err(DispatchError::invalid_state(format!(
                "order {id} is {:?}",
                order.status
            )));
        }
        order.notes.extend(notes.iter().cloned());
        Ok(order.clone())
    }

    fn create_assignment(
        &self,
        order_id: OrderId,
        unit_id: UnitId,
        assigned_at: DateTime<Utc>,
    ) -> DispatchResult<DispatchAssignment> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;

        let order = tables
            .orders
            .get(&order_id)
            .ok_or_else(|| DispatchError::not_found(format!("order {order_id}")))?;
        if order.is_terminal() {
            return Err(DispatchError::invalid_state(format!(
                "order {order_id} is {:?}",
                order.status
            )));
        }

        let unit = tables
            .units
            .get(&unit_id)
            .ok_or_else(|| DispatchError::not_found(format!("unit {unit_id}")))?;

        // The active assignment is authoritative for busyness; checked before
        // the status field so a working unit is reported busy, not
        // unavailable, even if its status has drifted.
        for existing in tables.assignments.values() {
            if existing.is_terminal() {
                continue;
            }
            if existing.unit_id == unit_id {
                if existing.order_id == order_id {
                    return Err(DispatchError::duplicate(format!(
                        "unit {unit_id} is already assigned to order {order_id}"
                    )));
                }
                return Err(DispatchError::unit_busy(format!(
                    "unit {unit_id} has an active assignment on order {}",
                    existing.order_id
                )));
            }
        }

        if !unit.is_available() {
            return Err(DispatchError::unit_unavailable(format!(
                "unit {unit_id} is {:?}",
                unit.status
            )));
        }

        let assignment = DispatchAssignment::new(order_id, unit_id, assigned_at);
        if let Some(unit) = tables.units.get_mut(&unit_id) {
            unit.status = UnitStatus::Assigned;
        }
        if let Some(order) = tables.orders.get_mut(&order_id) {
            if order.status == DispatchStatus::Created {
                order.status = DispatchStatus::InProgress;
            }
        }
        tables.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    fn transition_assignment(
        &self,
        id: AssignmentId,
        next: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> DispatchResult<TransitionOutcome> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;

        let assignment = tables
            .assignments
            .get(&id)
            .ok_or_else(|| DispatchError::not_found(format!("assignment {id}")))?
            .clone();

        let order = tables
            .orders
            .get(&assignment.order_id)
            .ok_or_else(|| DispatchError::not_found(format!("order {}", assignment.order_id)))?;
        if order.is_terminal() {
            return Err(DispatchError::invalid_state(format!(
                "order {} is {:?}",
                order.id, order.status
            )));
        }

        if !assignment.status.can_transition_to(next) {
            return Err(DispatchError::invalid_transition(format!(
                "assignment {id}: {:?} -> {next:?}",
                assignment.status
            )));
        }

        let order_id = assignment.order_id;
        let incident_id = order.incident_id;

        let assignment = {
            let stored = tables
                .assignments
                .get_mut(&id)
                .ok_or_else(|| DispatchError::not_found(format!("assignment {id}")))?;
            stored.status = next;
            stored.clone()
        };

        if let Some(unit) = tables.units.get_mut(&assignment.unit_id) {
            if unit.status != UnitStatus::Unavailable {
                unit.status = next.implied_unit_status();
            }
        }

        // Order rolls up to Completed when its last active assignment ends,
        // however it ended. The order had at least this one assignment.
        let mut order_completed = false;
        let all_terminal = tables
            .assignments
            .values()
            .filter(|a| a.order_id == order_id)
            .all(|a| a.is_terminal());
        if all_terminal {
            if let Some(order) = tables.orders.get_mut(&order_id) {
                if !order.is_terminal() {
                    order.status = DispatchStatus::Completed;
                    order.completed_at = Some(at);
                    order_completed = true;
                }
            }
        }

        Ok(TransitionOutcome {
            assignment,
            order_id,
            incident_id,
            order_completed,
        })
    }

    fn get_assignment(&self, id: AssignmentId) -> DispatchResult<DispatchAssignment> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        tables
            .assignments
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(format!("assignment {id}")))
    }

    fn list_assignments_for_order(
        &self,
        order_id: OrderId,
    ) -> DispatchResult<Vec<DispatchAssignment>> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        let mut assignments: Vec<DispatchAssignment> = tables
            .assignments
            .values()
            .filter(|a| a.order_id == order_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.assigned_at);
        Ok(assignments)
    }

    fn upsert_incident(&self, incident: IncidentCache) -> DispatchResult<()> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;
        tables.incidents.insert(incident.id, incident);
        Ok(())
    }

    fn insert_incident_if_absent(&self, incident: IncidentCache) -> DispatchResult<bool> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;
        if tables.incidents.contains_key(&incident.id) {
            return Ok(false);
        }
        tables.incidents.insert(incident.id, incident);
        Ok(true)
    }

    fn get_incident(&self, id: IncidentId) -> DispatchResult<Option<IncidentCache>> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        Ok(tables.incidents.get(&id).cloned())
    }
}

fn lock_poisoned<T>(_: std::sync::PoisonError<T>) -> DispatchError {
    DispatchError::internal("dispatch store lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_order_and_unit() -> (InMemoryDispatchStore, DispatchOrder, Unit) {
        let store = InMemoryDispatchStore::new();
        let unit = store
            .insert_unit(Unit::new("AMB-01", UnitType::Ambulance))
            .unwrap();
        let order = store
            .insert_order(DispatchOrder::new(IncidentId::new(), vec![], Utc::now()))
            .unwrap();
        (store, order, unit)
    }

    #[test]
    fn unit_codes_are_unique() {
        let store = InMemoryDispatchStore::new();
        store
            .insert_unit(Unit::new("AMB-01", UnitType::Ambulance))
            .unwrap();
        let err = store
            .insert_unit(Unit::new("AMB-01", UnitType::Police))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Duplicate(_)));
    }

    #[test]
    fn one_order_per_incident() {
        let store = InMemoryDispatchStore::new();
        let incident_id = IncidentId::new();
        store
            .insert_order(DispatchOrder::new(incident_id, vec![], Utc::now()))
            .unwrap();
        let err = store
            .insert_order(DispatchOrder::new(incident_id, vec![], Utc::now()))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Duplicate(_)));
    }

    #[test]
    fn assigning_marks_unit_and_starts_order() {
        let (store, order, unit) = store_with_order_and_unit();
        let assignment = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Assigned);
        assert_eq!(store.get_unit(unit.id).unwrap().status, UnitStatus::Assigned);
        assert_eq!(
            store.get_order(order.id).unwrap().status,
            DispatchStatus::InProgress
        );
    }

    #[test]
    fn busy_unit_is_rejected_as_busy_elsewhere() {
        let (store, order, unit) = store_with_order_and_unit();
        store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        let other = store
            .insert_order(DispatchOrder::new(IncidentId::new(), vec![], Utc::now()))
            .unwrap();
        let err = store
            .create_assignment(other.id, unit.id, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnitBusy(_)));
    }

    #[test]
    fn reassigning_the_same_unit_to_the_same_order_is_rejected() {
        let (store, order, unit) = store_with_order_and_unit();
        store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        let err = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DispatchError::Duplicate(_)));
    }

    #[test]
    fn out_of_service_unit_cannot_be_assigned() {
        let (store, order, unit) = store_with_order_and_unit();
        store
            .update_unit(
                unit.id,
                UnitPatch {
                    out_of_service: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        let err = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnitUnavailable(_)));
    }

    #[test]
    fn cannot_take_busy_unit_out_of_service() {
        let (store, order, unit) = store_with_order_and_unit();
        store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        let err = store
            .update_unit(
                unit.id,
                UnitPatch {
                    out_of_service: Some(true),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));
    }

    #[test]
    fn full_progression_completes_order_and_frees_unit() {
        let (store, order, unit) = store_with_order_and_unit();
        let assignment = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();

        for next in [
            AssignmentStatus::EnRoute,
            AssignmentStatus::OnSite,
        ] {
            let outcome = store
                .transition_assignment(assignment.id, next, Utc::now())
                .unwrap();
            assert!(!outcome.order_completed);
        }

        let outcome = store
            .transition_assignment(assignment.id, AssignmentStatus::Completed, Utc::now())
            .unwrap();
        assert!(outcome.order_completed);
        assert_eq!(outcome.incident_id, order.incident_id);

        let order = store.get_order(order.id).unwrap();
        assert_eq!(order.status, DispatchStatus::Completed);
        assert!(order.completed_at.is_some());
        assert_eq!(
            store.get_unit(unit.id).unwrap().status,
            UnitStatus::Available
        );
    }

    #[test]
    fn cancelling_the_only_assignment_completes_order() {
        let (store, order, unit) = store_with_order_and_unit();
        let assignment = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        let outcome = store
            .transition_assignment(assignment.id, AssignmentStatus::Cancelled, Utc::now())
            .unwrap();
        assert!(outcome.order_completed);

        let order = store.get_order(order.id).unwrap();
        assert_eq!(order.status, DispatchStatus::Completed);
        assert!(order.completed_at.is_some());
        assert_eq!(
            store.get_unit(unit.id).unwrap().status,
            UnitStatus::Available
        );
    }

    #[test]
    fn replaced_unit_frees_while_the_replacement_keeps_the_order_open() {
        let (store, order, unit) = store_with_order_and_unit();
        let first = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        let replacement_unit = store
            .insert_unit(Unit::new("AMB-02", UnitType::Ambulance))
            .unwrap();
        let second = store
            .create_assignment(order.id, replacement_unit.id, Utc::now())
            .unwrap();

        let outcome = store
            .transition_assignment(first.id, AssignmentStatus::Replaced, Utc::now())
            .unwrap();
        assert!(!outcome.order_completed);
        assert_eq!(
            store.get_unit(unit.id).unwrap().status,
            UnitStatus::Available
        );
        assert_eq!(
            store.get_order(order.id).unwrap().status,
            DispatchStatus::InProgress
        );

        for next in [
            AssignmentStatus::EnRoute,
            AssignmentStatus::OnSite,
            AssignmentStatus::Completed,
        ] {
            store
                .transition_assignment(second.id, next, Utc::now())
                .unwrap();
        }
        assert_eq!(
            store.get_order(order.id).unwrap().status,
            DispatchStatus::Completed
        );
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let (store, order, unit) = store_with_order_and_unit();
        let assignment = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        let err = store
            .transition_assignment(assignment.id, AssignmentStatus::Completed, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition(_)));
    }

    #[test]
    fn transitions_on_terminal_orders_are_rejected() {
        let (store, order, unit) = store_with_order_and_unit();
        let assignment = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        for next in [
            AssignmentStatus::EnRoute,
            AssignmentStatus::OnSite,
            AssignmentStatus::Completed,
        ] {
            store
                .transition_assignment(assignment.id, next, Utc::now())
                .unwrap();
        }
        let err = store
            .transition_assignment(assignment.id, AssignmentStatus::Cancelled, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));
    }

    #[test]
    fn concurrent_assigns_have_one_winner() {
        use std::thread;

        let store = Arc::new(InMemoryDispatchStore::new());
        let unit = store
            .insert_unit(Unit::new("AMB-01", UnitType::Ambulance))
            .unwrap();

        let mut orders = Vec::new();
        for _ in 0..8 {
            orders.push(
                store
                    .insert_order(DispatchOrder::new(IncidentId::new(), vec![], Utc::now()))
                    .unwrap(),
            );
        }

        let handles: Vec<_> = orders
            .iter()
            .map(|order| {
                let store = Arc::clone(&store);
                let order_id = order.id;
                let unit_id = unit.id;
                thread::spawn(move || store.create_assignment(order_id, unit_id, Utc::now()))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(DispatchError::UnitBusy(_)))));
    }

    #[test]
    fn notes_append_and_never_replace() {
        let (store, order, unit) = store_with_order_and_unit();
        store
            .append_order_notes(order.id, &["first".to_string()])
            .unwrap();
        let updated = store
            .append_order_notes(order.id, &["second".to_string()])
            .unwrap();
        assert_eq!(updated.notes, vec!["first", "second"]);

        let assignment = store
            .create_assignment(order.id, unit.id, Utc::now())
            .unwrap();
        for next in [
            AssignmentStatus::EnRoute,
            AssignmentStatus::OnSite,
            AssignmentStatus::Completed,
        ] {
            store
                .transition_assignment(assignment.id, next, Utc::now())
                .unwrap();
        }
        let err = store
            .append_order_notes(order.id, &["too late".to_string()])
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));
    }

    #[test]
    fn incident_cache_insert_if_absent_is_idempotent() {
        let store = InMemoryDispatchStore::new();
        let now = Utc::now();
        let incident = IncidentCache {
            id: IncidentId::new(),
            incident_code: "INC-2026-0001".into(),
            title: "Structure fire".into(),
            category: "Fire".into(),
            severity: "High".into(),
            status: "Created".into(),
            latitude: 42.66,
            longitude: 21.17,
            reported_at: now,
            last_synced_at: now,
            created_by_user_id: None,
        };
        assert!(store.insert_incident_if_absent(incident.clone()).unwrap());
        assert!(!store.insert_incident_if_absent(incident.clone()).unwrap());
        assert_eq!(store.get_incident(incident.id).unwrap().unwrap(), incident);
    }

    #[test]
    fn list_units_filters_by_type_and_status() {
        let store = InMemoryDispatchStore::new();
        store
            .insert_unit(Unit::new("AMB-01", UnitType::Ambulance))
            .unwrap();
        store
            .insert_unit(Unit::new("FIRE-01", UnitType::FireTruck))
            .unwrap();

        let filter = UnitFilter {
            unit_type: Some(UnitType::Ambulance),
            status: None,
        };
        let units = store.list_units(&filter).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].code, "AMB-01");

        let filter = UnitFilter {
            unit_type: None,
            status: Some(UnitStatus::Available),
        };
        assert_eq!(store.list_units(&filter).unwrap().len(), 2);
    }
}
