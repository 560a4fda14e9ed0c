//! Append-only activity log with realtime broadcast.
//!
//! Entries are never mutated or deleted. Every append publishes the
//! enriched entry on the global activity channel; enrichment is a
//! read-through join against users and tasks, not stored redundantly.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{ActivityEntry, ActivityView, UserView};
use crate::realtime::{RealtimeHub, ACTIVITY_EVENT};
use crate::store::Store;

/// Default length of the global activity feed.
pub const FEED_LIMIT: usize = 40;

#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<Store>,
    hub: Arc<RealtimeHub>,
}

impl ActivityLog {
    pub fn new(store: Arc<Store>, hub: Arc<RealtimeHub>) -> Self {
        Self { store, hub }
    }

    /// Append an entry, broadcast the enriched record, and return it.
    ///
    /// Callers treat this as fire-and-forget: the append itself cannot fail
    /// the surrounding operation (disk and publish failures are logged
    /// inside the store and hub).
    pub async fn append(
        &self,
        action: &str,
        actor_id: Uuid,
        task_id: Option<Uuid>,
        details: impl Into<String>,
    ) -> ActivityView {
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            action: action.to_string(),
            actor_id,
            task_id,
            details: details.into(),
            created_at: Utc::now(),
        };

        let entry = self.store.activity.insert(entry).await;
        let view = self.enrich(entry).await;
        self.hub.emit_all(ACTIVITY_EVENT, &view).await;
        view
    }

    /// Recent entries for one task, newest first.
    pub async fn recent(&self, task_id: Uuid, limit: usize) -> Vec<ActivityEntry> {
        let mut entries = self
            .store
            .activity
            .find(|e| e.task_id == Some(task_id))
            .await;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        entries
    }

    /// Global feed across all tasks, enriched, newest first.
    pub async fn feed(&self, limit: usize) -> Vec<ActivityView> {
        let mut entries = self.store.activity.list().await;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);

        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            views.push(self.enrich(entry).await);
        }
        views
    }

    async fn enrich(&self, entry: ActivityEntry) -> ActivityView {
        let actor = self
            .store
            .users
            .get(entry.actor_id)
            .await
            .map(|u| UserView::from(&u));
        let task_title = match entry.task_id {
            Some(task_id) => self.store.tasks.get(task_id).await.map(|t| t.title),
            None => None,
        };

        ActivityView {
            id: entry.id,
            action: entry.action,
            actor,
            task_id: entry.task_id,
            task_title,
            details: entry.details,
            created_at: entry.created_at,
        }
    }
}
