//! Task comments.
//!
//! Only the author may edit or delete a comment. Creation notifies the
//! task's assignee (unless they wrote it themselves) and every mutation is
//! broadcast and logged, all fire-and-forget after the comment itself is
//! persisted.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::activity::ActivityLog;
use crate::error::{Error, Result};
use crate::models::{AuthUser, Comment, CommentView, UserView};
use crate::notify::NotificationDispatcher;
use crate::realtime::RealtimeHub;
use crate::store::Store;

const ACTIVITY_SNIPPET_LEN: usize = 40;

#[derive(Clone)]
pub struct Comments {
    store: Arc<Store>,
    activity: ActivityLog,
    notifier: NotificationDispatcher,
    hub: Arc<RealtimeHub>,
}

impl Comments {
    pub fn new(
        store: Arc<Store>,
        activity: ActivityLog,
        notifier: NotificationDispatcher,
        hub: Arc<RealtimeHub>,
    ) -> Self {
        Self {
            store,
            activity,
            notifier,
            hub,
        }
    }

    /// Comments on a task, newest first, author-enriched.
    pub async fn list(&self, task_id: Uuid) -> Vec<CommentView> {
        let mut comments = self.store.comments.find(|c| c.task_id == task_id).await;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            views.push(self.enrich(comment).await);
        }
        views
    }

    pub async fn add(&self, task_id: Uuid, content: &str, actor: &AuthUser) -> Result<CommentView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::invalid_input("Content is required"));
        }

        let task = self
            .store
            .tasks
            .get(task_id)
            .await
            .ok_or_else(|| Error::not_found(format!("Task {} not found", task_id)))?;

        let comment = self
            .store
            .comments
            .insert(Comment {
                id: Uuid::new_v4(),
                task_id,
                author_id: actor.id,
                content: content.to_string(),
                created_at: Utc::now(),
            })
            .await;
        let view = self.enrich(comment).await;

        self.hub.emit_all("comment_added", &view).await;
        self.activity
            .append(
                "COMMENT_ADDED",
                actor.id,
                Some(task_id),
                format!("New comment added: \"{}\"", snippet(content)),
            )
            .await;

        if task.assigned_to != actor.id {
            let author_label = view
                .author
                .as_ref()
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "Someone".to_string());
            self.notifier
                .notify(
                    task.assigned_to,
                    format!("{} commented on \"{}\"", author_label, task.title),
                    Some(task.id),
                )
                .await;
        }

        Ok(view)
    }

    pub async fn update(&self, id: Uuid, content: &str, actor: &AuthUser) -> Result<CommentView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::invalid_input("Content is required"));
        }

        let comment = self.get_raw(id).await?;
        if comment.author_id != actor.id {
            return Err(Error::forbidden("Not authorized to edit this comment"));
        }

        let updated = self
            .store
            .comments
            .modify(id, |c| c.content = content.to_string())
            .await
            .ok_or_else(|| Error::not_found(format!("Comment {} not found", id)))?;
        let task_id = updated.task_id;
        let view = self.enrich(updated).await;

        self.hub.emit_all("comment_updated", &view).await;
        self.activity
            .append("COMMENT_UPDATED", actor.id, Some(task_id), "Comment updated")
            .await;

        Ok(view)
    }

    pub async fn delete(&self, id: Uuid, actor: &AuthUser) -> Result<()> {
        let comment = self.get_raw(id).await?;
        if comment.author_id != actor.id {
            return Err(Error::forbidden("Not authorized to delete this comment"));
        }

        let _ = self.store.comments.remove(id).await;

        self.hub
            .emit_all(
                "comment_deleted",
                &DeletedComment {
                    id,
                    task_id: comment.task_id,
                },
            )
            .await;
        self.activity
            .append(
                "COMMENT_DELETED",
                actor.id,
                Some(comment.task_id),
                "Comment deleted",
            )
            .await;

        Ok(())
    }

    async fn get_raw(&self, id: Uuid) -> Result<Comment> {
        self.store
            .comments
            .get(id)
            .await
            .ok_or_else(|| Error::not_found(format!("Comment {} not found", id)))
    }

    async fn enrich(&self, comment: Comment) -> CommentView {
        let author = self
            .store
            .users
            .get(comment.author_id)
            .await
            .map(|u| UserView::from(&u));
        CommentView {
            id: comment.id,
            task_id: comment.task_id,
            author,
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedComment {
    id: Uuid,
    task_id: Uuid,
}

/// First characters of a comment for activity details, ellipsized.
fn snippet(content: &str) -> String {
    if content.chars().count() <= ACTIVITY_SNIPPET_LEN {
        content.to_string()
    } else {
        let head: String = content.chars().take(ACTIVITY_SNIPPET_LEN).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, Role, Task, TaskStatus, User};

    struct Fixture {
        comments: Comments,
        store: Arc<Store>,
        notifier: NotificationDispatcher,
        author: AuthUser,
        assignee: AuthUser,
        task: Task,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path());
        let hub = Arc::new(RealtimeHub::new());
        let activity = ActivityLog::new(Arc::clone(&store), Arc::clone(&hub));
        let notifier = NotificationDispatcher::new(Arc::clone(&store), Arc::clone(&hub));
        let comments = Comments::new(
            Arc::clone(&store),
            activity,
            notifier.clone(),
            Arc::clone(&hub),
        );

        let author = add_user(&store, "Ada").await;
        let assignee = add_user(&store, "Lin").await;

        let now = Utc::now();
        let task = store
            .tasks
            .insert(Task {
                id: Uuid::new_v4(),
                title: "Review queue".into(),
                description: String::new(),
                priority: Priority::Medium,
                status: TaskStatus::Todo,
                created_by: author.id,
                assigned_to: assignee.id,
                due_date: None,
                workflow_stage: Uuid::new_v4(),
                subtasks: Vec::new(),
                created_at: now,
                updated_at: now,
            })
            .await;

        Fixture {
            comments,
            store,
            notifier,
            author,
            assignee,
            task,
            _dir: dir,
        }
    }

    async fn add_user(store: &Store, name: &str) -> AuthUser {
        let user = store
            .users
            .insert(User {
                id: Uuid::new_v4(),
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: String::new(),
                role: Role::User,
                avatar: None,
                bio: None,
                created_at: Utc::now(),
            })
            .await;
        AuthUser {
            id: user.id,
            role: user.role,
        }
    }

    #[tokio::test]
    async fn add_notifies_assignee_with_author_name() {
        let fx = fixture().await;

        fx.comments
            .add(fx.task.id, "Looks good to me", &fx.author)
            .await
            .unwrap();

        let notifications = fx.notifier.list_for(fx.assignee.id, 10).await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].message,
            "Ada commented on \"Review queue\""
        );
    }

    #[tokio::test]
    async fn self_comment_does_not_notify() {
        let fx = fixture().await;

        fx.comments
            .add(fx.task.id, "note to self", &fx.assignee)
            .await
            .unwrap();

        assert!(fx.notifier.list_for(fx.assignee.id, 10).await.is_empty());
    }

    #[tokio::test]
    async fn only_the_author_may_edit_or_delete() {
        let fx = fixture().await;
        let comment = fx
            .comments
            .add(fx.task.id, "original", &fx.author)
            .await
            .unwrap();

        let err = fx
            .comments
            .update(comment.id, "hijacked", &fx.assignee)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = fx
            .comments
            .delete(comment.id, &fx.assignee)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let updated = fx
            .comments
            .update(comment.id, "revised", &fx.author)
            .await
            .unwrap();
        assert_eq!(updated.content, "revised");

        fx.comments.delete(comment.id, &fx.author).await.unwrap();
        assert!(fx.store.comments.get(comment.id).await.is_none());
    }

    #[tokio::test]
    async fn add_requires_an_existing_task() {
        let fx = fixture().await;
        let err = fx
            .comments
            .add(Uuid::new_v4(), "into the void", &fx.author)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn snippet_truncates_long_content() {
        assert_eq!(snippet("short"), "short");
        let long = "x".repeat(60);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), ACTIVITY_SNIPPET_LEN + 3);
        assert!(s.ends_with("..."));
    }
}
