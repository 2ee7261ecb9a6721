//! Notification records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siren_core::NotificationId;

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    /// Broad grouping, e.g. "Incident" or "Dispatch".
    pub category: String,
    /// Kind within the category, e.g. "Create", "Update", "Assignment".
    pub kind: String,
    pub severity: String,
    /// "User" for a direct recipient, "System" for a broadcast.
    pub recipient_type: String,
    pub recipient_id: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    /// What the notification points at, e.g. "Incident" or "DispatchOrder".
    pub reference_type: String,
    pub reference_id: String,
    pub metadata: HashMap<String, String>,
}

/// Everything needed to create a notification, minus the store-assigned
/// fields.
#[derive(Debug, Clone, Default)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub category: String,
    pub kind: String,
    pub severity: String,
    pub recipient_type: String,
    pub recipient_id: String,
    pub reference_type: String,
    pub reference_id: String,
    pub metadata: HashMap<String, String>,
}

impl Notification {
    pub fn from_draft(draft: NotificationDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            title: draft.title,
            message: draft.message,
            category: draft.category,
            kind: draft.kind,
            severity: draft.severity,
            recipient_type: draft.recipient_type,
            recipient_id: draft.recipient_id,
            is_read: false,
            created_at,
            read_at: None,
            reference_type: draft.reference_type,
            reference_id: draft.reference_id,
            metadata: draft.metadata,
        }
    }
}
