//! Per-user notifications with realtime push.
//!
//! A notification is persisted first, then published on the recipient's
//! private channel. A missed realtime push is harmless; the record stays
//! queryable via `list_for`. Content is never edited after creation; only
//! the read flag flips.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Notification;
use crate::realtime::{RealtimeHub, NOTIFICATION_EVENT};
use crate::store::Store;

/// Default page size for a user's notification list.
pub const LIST_LIMIT: usize = 50;

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<Store>,
    hub: Arc<RealtimeHub>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<Store>, hub: Arc<RealtimeHub>) -> Self {
        Self { store, hub }
    }

    /// Persist a notification, then push it to the recipient's room.
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        message: impl Into<String>,
        task_id: Option<Uuid>,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id,
            message: message.into(),
            task_id,
            is_read: false,
            created_at: Utc::now(),
        };

        let notification = self.store.notifications.insert(notification).await;
        self.hub
            .emit_to_user(recipient_id, NOTIFICATION_EVENT, &notification)
            .await;
        notification
    }

    /// A user's notifications, newest first.
    pub async fn list_for(&self, user_id: Uuid, limit: usize) -> Vec<Notification> {
        let mut list = self
            .store
            .notifications
            .find(|n| n.recipient_id == user_id)
            .await;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit);
        list
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<()> {
        self.store
            .notifications
            .modify(id, |n| n.is_read = true)
            .await
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("Notification {} not found", id)))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> usize {
        self.store
            .notifications
            .modify_all(
                |n| n.recipient_id == user_id && !n.is_read,
                |n| n.is_read = true,
            )
            .await
    }
}
