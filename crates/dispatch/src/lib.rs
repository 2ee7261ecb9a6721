//! `siren-dispatch` — the Dispatch service core.
//!
//! Owns units, dispatch orders and dispatch assignments, and enforces the
//! dispatch lifecycle state machine. Learns about incidents only through the
//! Incident service's events, cached locally as a read-only projection.

pub mod assignment;
pub mod effects;
pub mod engine;
pub mod incident_cache;
pub mod order;
pub mod store;
pub mod unit;

pub use assignment::{AssignmentStatus, DispatchAssignment};
pub use effects::{incident_created_effect, incident_updated_effect};
pub use engine::{DispatchEngine, IncidentSync};
pub use incident_cache::IncidentCache;
pub use order::{DispatchOrder, DispatchStatus};
pub use store::{DispatchStore, InMemoryDispatchStore, TransitionOutcome, UnitFilter, UnitPatch};
pub use unit::{Unit, UnitStatus, UnitType};
