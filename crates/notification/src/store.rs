//! Notification persistence with dedup keys.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;

use siren_core::{DispatchError, DispatchResult, NotificationId};

use crate::notification::Notification;

pub trait NotificationStore: Send + Sync {
    /// Insert unless a row was already recorded under `dedup_key`. Returns
    /// `None` on a duplicate.
    fn insert_if_new(
        &self,
        dedup_key: &str,
        notification: Notification,
    ) -> DispatchResult<Option<Notification>>;
    fn get(&self, id: NotificationId) -> DispatchResult<Notification>;
    fn list_for_recipient(&self, recipient_id: &str) -> DispatchResult<Vec<Notification>>;
    fn list_all(&self) -> DispatchResult<Vec<Notification>>;
    fn mark_read(&self, id: NotificationId) -> DispatchResult<Notification>;
}

impl<S: NotificationStore + ?Sized> NotificationStore for Arc<S> {
    fn insert_if_new(
        &self,
        dedup_key: &str,
        notification: Notification,
    ) -> DispatchResult<Option<Notification>> {
        (**self).insert_if_new(dedup_key, notification)
    }
    fn get(&self, id: NotificationId) -> DispatchResult<Notification> {
        (**self).get(id)
    }
    fn list_for_recipient(&self, recipient_id: &str) -> DispatchResult<Vec<Notification>> {
        (**self).list_for_recipient(recipient_id)
    }
    fn list_all(&self) -> DispatchResult<Vec<Notification>> {
        (**self).list_all()
    }
    fn mark_read(&self, id: NotificationId) -> DispatchResult<Notification> {
        (**self).mark_read(id)
    }
}

#[derive(Default)]
struct Tables {
    notifications: HashMap<NotificationId, Notification>,
    dedup_keys: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryNotificationStore {
    tables: RwLock<Tables>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn insert_if_new(
        &self,
        dedup_key: &str,
        notification: Notification,
    ) -> DispatchResult<Option<Notification>> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;
        if !tables.dedup_keys.insert(dedup_key.to_string()) {
            return Ok(None);
        }
        tables
            .notifications
            .insert(notification.id, notification.clone());
        Ok(Some(notification))
    }

    fn get(&self, id: NotificationId) -> DispatchResult<Notification> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        tables
            .notifications
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(format!("notification {id}")))
    }

    fn list_for_recipient(&self, recipient_id: &str) -> DispatchResult<Vec<Notification>> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        let mut rows: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    fn list_all(&self) -> DispatchResult<Vec<Notification>> {
        let tables = self.tables.read().map_err(lock_poisoned)?;
        let mut rows: Vec<Notification> = tables.notifications.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    fn mark_read(&self, id: NotificationId) -> DispatchResult<Notification> {
        let mut tables = self.tables.write().map_err(lock_poisoned)?;
        let notification = tables
            .notifications
            .get_mut(&id)
            .ok_or_else(|| DispatchError::not_found(format!("notification {id}")))?;
        if !notification.is_read {
            notification.is_read = true;
            notification.read_at = Some(Utc::now());
        }
        Ok(notification.clone())
    }
}

fn lock_poisoned<T>(_: std::sync::PoisonError<T>) -> DispatchError {
    DispatchError::internal("notification store lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationDraft;

    fn notification(recipient: &str) -> Notification {
        Notification::from_draft(
            NotificationDraft {
                title: "Unit Assigned".into(),
                message: "A unit is on its way.".into(),
                category: "Dispatch".into(),
                kind: "Assignment".into(),
                severity: "High".into(),
                recipient_type: "User".into(),
                recipient_id: recipient.into(),
                reference_type: "DispatchAssignment".into(),
                reference_id: "ref-1".into(),
                metadata: HashMap::new(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn duplicate_dedup_key_inserts_once() {
        let store = InMemoryNotificationStore::new();
        assert!(store
            .insert_if_new("DispatchAssignmentCreated:ref-1", notification("u1"))
            .unwrap()
            .is_some());
        assert!(store
            .insert_if_new("DispatchAssignmentCreated:ref-1", notification("u1"))
            .unwrap()
            .is_none());
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn listing_filters_by_recipient() {
        let store = InMemoryNotificationStore::new();
        store.insert_if_new("k1", notification("u1")).unwrap();
        store.insert_if_new("k2", notification("u2")).unwrap();
        assert_eq!(store.list_for_recipient("u1").unwrap().len(), 1);
        assert_eq!(store.list_all().unwrap().len(), 2);
    }

    #[test]
    fn mark_read_stamps_read_at_once() {
        let store = InMemoryNotificationStore::new();
        let inserted = store.insert_if_new("k", notification("u1")).unwrap().unwrap();
        let read = store.mark_read(inserted.id).unwrap();
        assert!(read.is_read);
        let first_read_at = read.read_at;
        assert!(first_read_at.is_some());
        // Second mark keeps the original timestamp.
        let again = store.mark_read(inserted.id).unwrap();
        assert_eq!(again.read_at, first_read_at);
    }
}
