//! Incident records and the status ladder.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use siren_core::{DispatchError, IncidentId, UserId};

/// Forward-only lifecycle status.
///
/// Dispatch events only ever move status to the right; a lower target is
/// ignored, never applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Created,
    Acknowledged,
    InProgress,
    Resolved,
}

impl IncidentStatus {
    /// True when moving to `target` goes forward on the ladder.
    pub fn allows_upgrade_to(&self, target: IncidentStatus) -> bool {
        target > *self
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Acknowledged => "Acknowledged",
            Self::InProgress => "InProgress",
            Self::Resolved => "Resolved",
        };
        f.write_str(s)
    }
}

impl FromStr for IncidentStatus {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "acknowledged" => Ok(Self::Acknowledged),
            "inprogress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(DispatchError::validation(format!(
                "unknown incident status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(DispatchError::validation(format!(
                "unknown severity '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentCategory {
    Fire,
    Medical,
    Police,
    Rescue,
}

impl fmt::Display for IncidentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fire => "Fire",
            Self::Medical => "Medical",
            Self::Police => "Police",
            Self::Rescue => "Rescue",
        };
        f.write_str(s)
    }
}

impl FromStr for IncidentCategory {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fire" => Ok(Self::Fire),
            "medical" => Ok(Self::Medical),
            "police" => Ok(Self::Police),
            "rescue" => Ok(Self::Rescue),
            other => Err(DispatchError::validation(format!(
                "unknown incident category '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    /// Human-facing code, e.g. "INC-4F2A".
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub category: IncidentCategory,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub reporter_name: Option<String>,
    pub reporter_contact: Option<String>,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub created_by_user_id: Option<UserId>,
}

/// Request payload for creating an incident.
#[derive(Debug, Clone)]
pub struct NewIncident {
    pub title: String,
    pub description: Option<String>,
    pub category: IncidentCategory,
    pub severity: Severity,
    pub latitude: f64,
    pub longitude: f64,
    pub reporter_name: Option<String>,
    pub reporter_contact: Option<String>,
    pub created_by_user_id: Option<UserId>,
}

impl NewIncident {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.title.trim().is_empty() {
            return Err(DispatchError::validation("title must not be empty"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DispatchError::validation(
                "latitude must be between -90 and 90",
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DispatchError::validation(
                "longitude must be between -180 and 180",
            ));
        }
        Ok(())
    }
}

/// Fields a caller may change on an existing incident.
#[derive(Debug, Default, Clone)]
pub struct IncidentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<IncidentCategory>,
    pub severity: Option<Severity>,
    pub status: Option<IncidentStatus>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub resolution_notes: Option<String>,
}

impl Incident {
    pub fn new(new: NewIncident, reported_at: DateTime<Utc>) -> Self {
        Self {
            id: IncidentId::new(),
            code: generate_incident_code(),
            title: new.title,
            description: new.description,
            category: new.category,
            severity: new.severity,
            status: IncidentStatus::Created,
            latitude: new.latitude,
            longitude: new.longitude,
            reporter_name: new.reporter_name,
            reporter_contact: new.reporter_contact,
            reported_at,
            resolved_at: None,
            resolution_notes: None,
            created_by_user_id: new.created_by_user_id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == IncidentStatus::Resolved
    }
}

/// Short human-facing code derived from a fresh UUID's random tail.
fn generate_incident_code() -> String {
    let raw = Uuid::now_v7().simple().to_string();
    format!("INC-{}", raw[raw.len() - 4..].to_uppercase())
}
