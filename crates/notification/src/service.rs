//! Notification service operations.

use chrono::Utc;
use tracing::info;

use siren_core::{DispatchResult, NotificationId};

use crate::notification::{Notification, NotificationDraft};
use crate::store::NotificationStore;

pub struct NotificationService<S: NotificationStore> {
    store: S,
}

impl<S: NotificationStore> NotificationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Records a notification under a dedup key. Returns `None` when the key
    /// was already recorded (redelivered event).
    pub fn record(
        &self,
        dedup_key: &str,
        draft: NotificationDraft,
    ) -> DispatchResult<Option<Notification>> {
        let notification = Notification::from_draft(draft, Utc::now());
        let inserted = self.store.insert_if_new(dedup_key, notification)?;
        match &inserted {
            Some(notification) => {
                info!(
                    notification_id = %notification.id,
                    recipient = %notification.recipient_id,
                    title = %notification.title,
                    "recorded notification"
                );
            }
            None => {
                info!(dedup_key, "notification already recorded, skipping");
            }
        }
        Ok(inserted)
    }

    pub fn notification(&self, id: NotificationId) -> DispatchResult<Notification> {
        self.store.get(id)
    }

    pub fn notifications(&self) -> DispatchResult<Vec<Notification>> {
        self.store.list_all()
    }

    pub fn notifications_for_recipient(
        &self,
        recipient_id: &str,
    ) -> DispatchResult<Vec<Notification>> {
        self.store.list_for_recipient(recipient_id)
    }

    pub fn mark_read(&self, id: NotificationId) -> DispatchResult<Notification> {
        self.store.mark_read(id)
    }
}
