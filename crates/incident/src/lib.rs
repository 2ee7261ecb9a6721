//! `siren-incident` — the Incident service core.
//!
//! Owns incident records and their forward-only status ladder, publishes
//! `IncidentCreated` / `IncidentUpdated`, and consumes dispatch events to
//! advance incident status.

pub mod effects;
pub mod incident;
pub mod service;
pub mod store;

pub use effects::dispatch_event_effect;
pub use incident::{Incident, IncidentCategory, IncidentPatch, IncidentStatus, NewIncident, Severity};
pub use service::IncidentService;
pub use store::{IncidentStore, InMemoryIncidentStore};
