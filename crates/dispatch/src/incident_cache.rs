//! Local read-only projection of Incident service state.
//!
//! The Dispatch service never calls the Incident service; everything it knows
//! about an incident arrives through `IncidentCreated` / `IncidentUpdated`
//! events and is cached here. Rows are created once and merged field-by-field
//! afterwards, never deleted.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siren_core::{DispatchResult, IncidentId, UserId};
use siren_events::contracts::IncidentEventData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentCache {
    pub id: IncidentId,
    /// Human-facing incident code (e.g. "INC-4F2A").
    pub incident_code: String,
    pub title: String,
    pub category: String,
    pub severity: String,
    pub status: String,
    pub latitude: f64,
    pub longitude: f64,
    pub reported_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    pub created_by_user_id: Option<UserId>,
}

impl IncidentCache {
    /// Builds a cache row from an `IncidentCreated` payload.
    ///
    /// Fails only on an unparseable incident id; an unparseable creator id
    /// degrades to `None`.
    pub fn from_created(data: &IncidentEventData, now: DateTime<Utc>) -> DispatchResult<Self> {
        let id = IncidentId::from_str(&data.id)?;
        let status = if data.status.is_empty() {
            "Created".to_string()
        } else {
            data.status.clone()
        };
        Ok(Self {
            id,
            incident_code: data.incident_id.clone(),
            title: data.title.clone(),
            category: data.category.clone(),
            severity: data.severity.clone(),
            status,
            latitude: data.latitude,
            longitude: data.longitude,
            reported_at: now,
            last_synced_at: now,
            created_by_user_id: UserId::from_str(&data.created_by_user_id).ok(),
        })
    }

    /// Merges the non-empty fields of an `IncidentUpdated` payload into the
    /// cached row and returns the order notes derived from fields that
    /// actually changed.
    ///
    /// Change detection is case-insensitive for strings and non-zero for
    /// coordinates, so redelivering the same update yields no notes.
    pub fn merge(&mut self, data: &IncidentEventData, now: DateTime<Utc>) -> Vec<String> {
        let mut notes = Vec::new();

        if !data.status.is_empty() && !data.status.eq_ignore_ascii_case(&self.status) {
            self.status = data.status.clone();
            notes.push(format!("Incident status updated to: {}", data.status));
            if data.status.eq_ignore_ascii_case("Resolved")
                || data.status.eq_ignore_ascii_case("Closed")
            {
                notes.push(format!(
                    "Incident has been {}. Dispatch order may need review.",
                    data.status.to_lowercase()
                ));
            }
        }

        let location_changed = data.latitude != 0.0
            && data.longitude != 0.0
            && (data.latitude != self.latitude || data.longitude != self.longitude);
        if data.latitude != 0.0 {
            self.latitude = data.latitude;
        }
        if data.longitude != 0.0 {
            self.longitude = data.longitude;
        }
        if location_changed {
            notes.push(format!(
                "Incident location updated: Lat {}, Long {}",
                data.latitude, data.longitude
            ));
        }

        if !data.severity.is_empty() && !data.severity.eq_ignore_ascii_case(&self.severity) {
            self.severity = data.severity.clone();
            notes.push(format!("Incident severity updated to: {}", data.severity));
        }

        if !data.title.is_empty() && !data.title.eq_ignore_ascii_case(&self.title) {
            self.title = data.title.clone();
            notes.push(format!("Incident title: {}", data.title));
        }

        if !data.category.is_empty() {
            self.category = data.category.clone();
        }

        self.last_synced_at = now;
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_data() -> IncidentEventData {
        IncidentEventData {
            id: IncidentId::new().to_string(),
            incident_id: "INC-2026-0314".into(),
            title: "Structure fire".into(),
            category: "Fire".into(),
            severity: "High".into(),
            status: "Created".into(),
            latitude: 42.66,
            longitude: 21.17,
            created_by_user_id: UserId::new().to_string(),
        }
    }

    #[test]
    fn from_created_defaults_empty_status_to_created() {
        let mut data = created_data();
        data.status = String::new();
        let cache = IncidentCache::from_created(&data, Utc::now()).unwrap();
        assert_eq!(cache.status, "Created");
        assert!(cache.created_by_user_id.is_some());
    }

    #[test]
    fn from_created_rejects_bad_incident_id() {
        let mut data = created_data();
        data.id = "not-a-uuid".into();
        assert!(IncidentCache::from_created(&data, Utc::now()).is_err());
    }

    #[test]
    fn from_created_tolerates_missing_creator() {
        let mut data = created_data();
        data.created_by_user_id = String::new();
        let cache = IncidentCache::from_created(&data, Utc::now()).unwrap();
        assert!(cache.created_by_user_id.is_none());
    }

    #[test]
    fn merge_derives_notes_for_changed_fields_only() {
        let mut cache = IncidentCache::from_created(&created_data(), Utc::now()).unwrap();
        let update = IncidentEventData {
            id: cache.id.to_string(),
            status: "InProgress".into(),
            severity: "Critical".into(),
            ..Default::default()
        };
        let notes = cache.merge(&update, Utc::now());
        assert_eq!(
            notes,
            vec![
                "Incident status updated to: InProgress".to_string(),
                "Incident severity updated to: Critical".to_string(),
            ]
        );
        assert_eq!(cache.status, "InProgress");
        assert_eq!(cache.severity, "Critical");
        // Untouched fields survive the merge.
        assert_eq!(cache.title, "Structure fire");
        assert_eq!(cache.latitude, 42.66);
    }

    #[test]
    fn merge_of_identical_update_produces_no_notes() {
        let data = created_data();
        let mut cache = IncidentCache::from_created(&data, Utc::now()).unwrap();
        let notes = cache.merge(&data, Utc::now());
        assert!(notes.is_empty());
    }

    #[test]
    fn merge_comparison_is_case_insensitive() {
        let mut cache = IncidentCache::from_created(&created_data(), Utc::now()).unwrap();
        let update = IncidentEventData {
            status: "CREATED".into(),
            ..Default::default()
        };
        assert!(cache.merge(&update, Utc::now()).is_empty());
    }

    #[test]
    fn resolved_status_adds_review_note() {
        let mut cache = IncidentCache::from_created(&created_data(), Utc::now()).unwrap();
        let update = IncidentEventData {
            status: "Resolved".into(),
            ..Default::default()
        };
        let notes = cache.merge(&update, Utc::now());
        assert_eq!(
            notes,
            vec![
                "Incident status updated to: Resolved".to_string(),
                "Incident has been resolved. Dispatch order may need review.".to_string(),
            ]
        );
    }

    #[test]
    fn location_note_requires_both_coordinates() {
        let mut cache = IncidentCache::from_created(&created_data(), Utc::now()).unwrap();
        let update = IncidentEventData {
            latitude: 43.0,
            ..Default::default()
        };
        let notes = cache.merge(&update, Utc::now());
        assert!(notes.is_empty());
        // The non-zero coordinate still merges.
        assert_eq!(cache.latitude, 43.0);

        let update = IncidentEventData {
            latitude: 44.0,
            longitude: 20.0,
            ..Default::default()
        };
        let notes = cache.merge(&update, Utc::now());
        assert_eq!(
            notes,
            vec!["Incident location updated: Lat 44, Long 20".to_string()]
        );
    }
}
