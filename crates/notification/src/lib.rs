//! `siren-notification` — the Notification service core.
//!
//! Turns dispatch and incident events into notification rows. Delivery is
//! at-least-once upstream, so every row is recorded under a dedup key and
//! redelivery never creates a second copy.

pub mod effects;
pub mod notification;
pub mod service;
pub mod store;

pub use effects::{dispatch_event_effect, incident_created_effect, incident_updated_effect};
pub use notification::{Notification, NotificationDraft};
pub use service::NotificationService;
pub use store::{InMemoryNotificationStore, NotificationStore};
