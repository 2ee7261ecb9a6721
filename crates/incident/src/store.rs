//! Incident persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use siren_core::{DispatchError, DispatchResult, IncidentId};

use crate::incident::{Incident, IncidentStatus};

pub trait IncidentStore: Send + Sync {
    fn insert(&self, incident: Incident) -> DispatchResult<Incident>;
    fn get(&self, id: IncidentId) -> DispatchResult<Incident>;
    fn list(&self, status: Option<IncidentStatus>) -> DispatchResult<Vec<Incident>>;
    /// Apply `mutate` to the stored incident under the write lock and return
    /// the updated row.
    fn update_with(
        &self,
        id: IncidentId,
        mutate: &mut dyn FnMut(&mut Incident) -> DispatchResult<()>,
    ) -> DispatchResult<Incident>;
}

impl<S: IncidentStore + ?Sized> IncidentStore for Arc<S> {
    fn insert(&self, incident: Incident) -> DispatchResult<Incident> {
        (**self).insert(incident)
    }
    fn get(&self, id: IncidentId) -> DispatchResult<Incident> {
        (**self).get(id)
    }
    fn list(&self, status: Option<IncidentStatus>) -> DispatchResult<Vec<Incident>> {
        (**self).list(status)
    }
    fn update_with(
        &self,
        id: IncidentId,
        mutate: &mut dyn FnMut(&mut Incident) -> DispatchResult<()>,
    ) -> DispatchResult<Incident> {
        (**self).update_with(id, mutate)
    }
}

#[derive(Default)]
pub struct InMemoryIncidentStore {
    incidents: RwLock<HashMap<IncidentId, Incident>>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IncidentStore for InMemoryIncidentStore {
    fn insert(&self, incident: Incident) -> DispatchResult<Incident> {
        let mut incidents = self.incidents.write().map_err(lock_poisoned)?;
        if incidents.values().any(|i| i.code == incident.code) {
            return Err(DispatchError::duplicate(format!(
                "incident code '{}' already exists",
                incident.code
            )));
        }
        incidents.insert(incident.id, incident.clone());
        Ok(incident)
    }

    fn get(&self, id: IncidentId) -> DispatchResult<Incident> {
        let incidents = self.incidents.read().map_err(lock_poisoned)?;
        incidents
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(format!("incident {id}")))
    }

    fn list(&self, status: Option<IncidentStatus>) -> DispatchResult<Vec<Incident>> {
        let incidents = self.incidents.read().map_err(lock_poisoned)?;
        let mut rows: Vec<Incident> = incidents
            .values()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));
        Ok(rows)
    }

    fn update_with(
        &self,
        id: IncidentId,
        mutate: &mut dyn FnMut(&mut Incident) -> DispatchResult<()>,
    ) -> DispatchResult<Incident> {
        let mut incidents = self.incidents.write().map_err(lock_poisoned)?;
        let incident = incidents
            .get_mut(&id)
            .ok_or_else(|| DispatchError::not_found(format!("incident {id}")))?;
        // Mutate a copy and commit only on success.
        let mut updated = incident.clone();
        mutate(&mut updated)?;
        *incident = updated.clone();
        Ok(updated)
    }
}

fn lock_poisoned<T>(_: std::sync::PoisonError<T>) -> DispatchError {
    DispatchError::internal("incident store lock poisoned")
}
