//! `siren-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers and the error taxonomy shared by the services.

pub mod error;
pub mod id;

pub use error::{DispatchError, DispatchResult};
pub use id::{AssignmentId, IncidentId, NotificationId, OrderId, UnitId, UserId};
