//! Dispatchable units.

use serde::{Deserialize, Serialize};

use siren_core::UnitId;

/// Kind of resource a unit represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Ambulance,
    FireTruck,
    Police,
    Rescue,
}

/// Operational status of a unit.
///
/// Derived from the unit's most recent non-terminal assignment; never set
/// directly by callers (except `Unavailable`, an out-of-service flag).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Available,
    Assigned,
    EnRoute,
    OnSite,
    Unavailable,
}

/// A dispatchable resource (e.g. "AMB-01", "FIRE-03").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    /// Unique call sign.
    pub code: String,
    pub unit_type: UnitType,
    pub status: UnitStatus,
    /// Last known position, when tracked.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Unit {
    /// New units start available, with no known position.
    pub fn new(code: impl Into<String>, unit_type: UnitType) -> Self {
        Self {
            id: UnitId::new(),
            code: code.into(),
            unit_type,
            status: UnitStatus::Available,
            latitude: None,
            longitude: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == UnitStatus::Available
    }
}
