//! Task lifecycle orchestration.
//!
//! Owns task CRUD, stage-driven status derivation, subtask mutation,
//! assignment changes, NLP-driven creation, and the on-demand risk report.
//! Every mutating operation persists the primary change first, then fires
//! the auxiliary side effects (assignee notification + activity append,
//! which itself broadcasts); those are best-effort and never roll back or
//! fail the mutation.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivityLog;
use crate::ai::AssistClient;
use crate::error::{Error, Result};
use crate::models::{
    AuthUser, Priority, Subtask, Task, TaskStatus, TaskView, UserView, WorkflowStage,
};
use crate::notify::NotificationDispatcher;
use crate::risk::{self, RiskLevel, RiskSignals, RECENT_ACTIVITY_LIMIT};
use crate::stages::derived_status;
use crate::store::Store;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub assigned_to: Uuid,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub workflow_stage: Uuid,
}

/// Fields addressable by the generic update. `status`, `workflowStage`,
/// and `subtasks` are deliberately not representable here: status is
/// derived, and stage moves go through [`TaskLifecycle::change_stage`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
}

/// ANDed list filter. `search` is a case-insensitive title substring.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub workflow_stage: Option<Uuid>,
    pub search: Option<String>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == p)
            && self.assigned_to.map_or(true, |u| task.assigned_to == u)
            && self.created_by.map_or(true, |u| task.created_by == u)
            && self
                .workflow_stage
                .map_or(true, |s| task.workflow_stage == s)
            && self.search.as_deref().map_or(true, |needle| {
                task.title.to_lowercase().contains(&needle.to_lowercase())
            })
    }
}

/// Deterministic risk report combined with its AI explanation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub score: u8,
    pub level: RiskLevel,
    pub signals: RiskSignals,
    pub summary: String,
    pub reasons: Vec<String>,
    pub suggested_action: String,
}

#[derive(Clone)]
pub struct TaskLifecycle {
    store: Arc<Store>,
    activity: ActivityLog,
    notifier: NotificationDispatcher,
    assist: Arc<dyn AssistClient>,
}

impl TaskLifecycle {
    pub fn new(
        store: Arc<Store>,
        activity: ActivityLog,
        notifier: NotificationDispatcher,
        assist: Arc<dyn AssistClient>,
    ) -> Self {
        Self {
            store,
            activity,
            notifier,
            assist,
        }
    }

    pub async fn create(&self, input: CreateTaskInput, actor: &AuthUser) -> Result<TaskView> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(Error::invalid_input("Title is required"));
        }

        let stage = self
            .store
            .stages
            .get(input.workflow_stage)
            .await
            .ok_or_else(|| Error::invalid_input("Invalid workflow stage"))?;

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: input.description.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            status: derived_status(&stage.name),
            created_by: actor.id,
            assigned_to: input.assigned_to,
            due_date: input.due_date,
            workflow_stage: stage.id,
            subtasks: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let task = self.store.tasks.insert(task).await;

        self.notifier
            .notify(
                task.assigned_to,
                format!("You have been assigned a new task: \"{}\"", task.title),
                Some(task.id),
            )
            .await;
        self.activity
            .append(
                "TASK_CREATED",
                actor.id,
                Some(task.id),
                format!("Created task \"{}\"", task.title),
            )
            .await;

        Ok(self.enrich(task).await)
    }

    pub async fn get(&self, id: Uuid) -> Result<TaskView> {
        let task = self.get_raw(id).await?;
        Ok(self.enrich(task).await)
    }

    /// Tasks matching the filter, newest first.
    pub async fn list(&self, filter: &TaskFilter) -> Vec<TaskView> {
        let mut tasks = self.store.tasks.find(|t| filter.matches(t)).await;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut views = Vec::with_capacity(tasks.len());
        for task in tasks {
            views.push(self.enrich(task).await);
        }
        views
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateTaskInput,
        actor: &AuthUser,
    ) -> Result<TaskView> {
        let task = self.get_raw(id).await?;
        self.require_owner(&task, actor, "update")?;

        if let Some(title) = &input.title {
            if title.trim().is_empty() {
                return Err(Error::invalid_input("Title cannot be empty"));
            }
        }

        let updated = self
            .store
            .tasks
            .modify(id, |t| {
                if let Some(title) = input.title {
                    t.title = title.trim().to_string();
                }
                if let Some(description) = input.description {
                    t.description = description;
                }
                if let Some(priority) = input.priority {
                    t.priority = priority;
                }
                if let Some(due_date) = input.due_date {
                    t.due_date = Some(due_date);
                }
                if let Some(assigned_to) = input.assigned_to {
                    t.assigned_to = assigned_to;
                }
                t.updated_at = Utc::now();
            })
            .await
            .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))?;

        self.notifier
            .notify(
                updated.assigned_to,
                format!("Task \"{}\" was updated", updated.title),
                Some(updated.id),
            )
            .await;
        self.activity
            .append("TASK_UPDATED", actor.id, Some(id), "Updated task")
            .await;

        Ok(self.enrich(updated).await)
    }

    /// Delete a task and its subtasks. Activity and notification records
    /// referencing the id are retained (weak references, queryable with a
    /// dangling id).
    pub async fn delete(&self, id: Uuid, actor: &AuthUser) -> Result<()> {
        let task = self.get_raw(id).await?;
        self.require_owner(&task, actor, "delete")?;

        let _ = self.store.tasks.remove(id).await;

        self.notifier
            .notify(
                task.assigned_to,
                format!("Task \"{}\" was deleted", task.title),
                Some(task.id),
            )
            .await;
        self.activity
            .append("TASK_DELETED", actor.id, Some(id), "Deleted task")
            .await;

        Ok(())
    }

    /// Move a task to another stage, recomputing its derived status.
    /// Creator, assignee, or an admin may move a task.
    pub async fn change_stage(
        &self,
        id: Uuid,
        stage_id: Uuid,
        actor: &AuthUser,
    ) -> Result<TaskView> {
        let task = self.get_raw(id).await?;
        if task.created_by != actor.id && task.assigned_to != actor.id && !actor.is_admin() {
            return Err(Error::forbidden("Not authorized to move this task"));
        }

        let stage = self
            .store
            .stages
            .get(stage_id)
            .await
            .ok_or_else(|| Error::invalid_input("Invalid workflow stage"))?;

        let status = derived_status(&stage.name);
        let updated = self
            .store
            .tasks
            .modify(id, |t| {
                t.workflow_stage = stage.id;
                t.status = status;
                t.updated_at = Utc::now();
            })
            .await
            .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))?;

        self.notifier
            .notify(
                updated.assigned_to,
                format!("Task \"{}\" moved to {}", updated.title, stage.name),
                Some(updated.id),
            )
            .await;
        self.activity
            .append(
                "STATUS_CHANGED",
                actor.id,
                Some(id),
                format!("Moved to {}", stage.name),
            )
            .await;

        Ok(self.enrich(updated).await)
    }

    /// Reassign a task. Only the creator or an admin; the current assignee
    /// alone cannot hand a task to someone else.
    pub async fn reassign(
        &self,
        id: Uuid,
        new_assignee: Uuid,
        actor: &AuthUser,
    ) -> Result<TaskView> {
        let task = self.get_raw(id).await?;
        self.require_owner(&task, actor, "reassign")?;

        let updated = self
            .store
            .tasks
            .modify(id, |t| {
                t.assigned_to = new_assignee;
                t.updated_at = Utc::now();
            })
            .await
            .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))?;

        let assignee_label = match self.store.users.get(new_assignee).await {
            Some(user) => user.name,
            None => new_assignee.to_string(),
        };

        self.notifier
            .notify(
                new_assignee,
                format!("You have been assigned task \"{}\"", updated.title),
                Some(updated.id),
            )
            .await;
        self.activity
            .append(
                "TASK_ASSIGNED",
                actor.id,
                Some(id),
                format!("Assigned to {}", assignee_label),
            )
            .await;

        Ok(self.enrich(updated).await)
    }

    pub async fn add_subtask(&self, task_id: Uuid, title: &str) -> Result<Vec<Subtask>> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::invalid_input("Subtask title is required"));
        }

        let updated = self
            .store
            .tasks
            .modify(task_id, |t| {
                t.subtasks.push(Subtask::new(title));
                t.updated_at = Utc::now();
            })
            .await
            .ok_or_else(|| Error::not_found(format!("Task {} not found", task_id)))?;

        Ok(updated.subtasks)
    }

    pub async fn update_subtask(
        &self,
        task_id: Uuid,
        subtask_id: Uuid,
        title: Option<String>,
        is_done: Option<bool>,
    ) -> Result<Vec<Subtask>> {
        let task = self.get_raw(task_id).await?;
        if !task.subtasks.iter().any(|s| s.id == subtask_id) {
            return Err(Error::not_found(format!(
                "Subtask {} not found",
                subtask_id
            )));
        }

        let updated = self
            .store
            .tasks
            .modify(task_id, |t| {
                if let Some(subtask) = t.subtasks.iter_mut().find(|s| s.id == subtask_id) {
                    if let Some(title) = title {
                        subtask.title = title;
                    }
                    if let Some(is_done) = is_done {
                        subtask.is_done = is_done;
                    }
                }
                t.updated_at = Utc::now();
            })
            .await
            .ok_or_else(|| Error::not_found(format!("Task {} not found", task_id)))?;

        Ok(updated.subtasks)
    }

    pub async fn delete_subtask(&self, task_id: Uuid, subtask_id: Uuid) -> Result<Vec<Subtask>> {
        let task = self.get_raw(task_id).await?;
        if !task.subtasks.iter().any(|s| s.id == subtask_id) {
            return Err(Error::not_found(format!(
                "Subtask {} not found",
                subtask_id
            )));
        }

        let updated = self
            .store
            .tasks
            .modify(task_id, |t| {
                t.subtasks.retain(|s| s.id != subtask_id);
                t.updated_at = Utc::now();
            })
            .await
            .ok_or_else(|| Error::not_found(format!("Task {} not found", task_id)))?;

        Ok(updated.subtasks)
    }

    /// Create a task from free-form text via the AI parser.
    ///
    /// The parsed assignee name must match an existing user exactly
    /// (case-insensitive); the task lands in the first stage on the board
    /// with status fixed to todo.
    pub async fn create_from_text(&self, text: &str, actor: &AuthUser) -> Result<TaskView> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("Text is required"));
        }

        let users: Vec<UserView> = self
            .store
            .users
            .list()
            .await
            .iter()
            .map(UserView::from)
            .collect();

        let parsed = self.assist.parse_task(text, &users).await?;

        let assignee = parsed
            .assignee_name
            .as_deref()
            .and_then(|name| {
                users
                    .iter()
                    .find(|u| u.name.eq_ignore_ascii_case(name.trim()))
            })
            .ok_or_else(|| Error::invalid_input("Assignee not found"))?;

        let stage = self
            .first_stage()
            .await
            .ok_or_else(|| Error::invalid_input("No workflow stage found"))?;

        let title = parsed.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidAiResponse("parsed title is empty".into()));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title,
            description: parsed.description.unwrap_or_default(),
            priority: parsed.priority.unwrap_or_default(),
            status: TaskStatus::Todo,
            created_by: actor.id,
            assigned_to: assignee.id,
            due_date: parsed.due_date.as_deref().and_then(parse_due_date),
            workflow_stage: stage.id,
            subtasks: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let task = self.store.tasks.insert(task).await;

        self.activity
            .append("TASK_CREATED_NLP", actor.id, Some(task.id), "Created via NLP")
            .await;

        Ok(self.enrich(task).await)
    }

    /// Deterministic risk score for a task, refined with the AI explanation.
    /// An AI failure fails the request; no fallback text is synthesized.
    pub async fn risk_report(&self, id: Uuid) -> Result<RiskAssessment> {
        let task = self.get_raw(id).await?;
        let activities = self.activity.recent(id, RECENT_ACTIVITY_LIMIT).await;

        let report = risk::analyze(&task, &activities, Utc::now());
        let explanation = self.assist.explain_risk(&report).await?;

        Ok(RiskAssessment {
            score: report.score,
            level: report.level,
            signals: report.signals,
            summary: explanation.summary,
            reasons: explanation.reasons,
            suggested_action: explanation.suggested_action,
        })
    }

    async fn get_raw(&self, id: Uuid) -> Result<Task> {
        self.store
            .tasks
            .get(id)
            .await
            .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))
    }

    fn require_owner(&self, task: &Task, actor: &AuthUser, verb: &str) -> Result<()> {
        if task.created_by != actor.id && !actor.is_admin() {
            return Err(Error::forbidden(format!(
                "Not authorized to {} this task",
                verb
            )));
        }
        Ok(())
    }

    async fn first_stage(&self) -> Option<WorkflowStage> {
        let mut stages = self.store.stages.list().await;
        stages.sort_by_key(|s| s.order);
        stages.into_iter().next()
    }

    async fn enrich(&self, task: Task) -> TaskView {
        let created_by = self
            .store
            .users
            .get(task.created_by)
            .await
            .map(|u| UserView::from(&u));
        let assigned_to = self
            .store
            .users
            .get(task.assigned_to)
            .await
            .map(|u| UserView::from(&u));
        let workflow_stage = self.store.stages.get(task.workflow_stage).await;

        TaskView {
            id: task.id,
            title: task.title,
            description: task.description,
            priority: task.priority,
            status: task.status,
            created_by,
            assigned_to,
            due_date: task.due_date,
            workflow_stage,
            subtasks: task.subtasks,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::ai::{Enhancement, ParsedTask, RiskExplanation, SubtaskSuggestions};
    use crate::models::{Role, User};
    use crate::realtime::RealtimeHub;
    use crate::risk::RiskReport;
    use crate::stages::StageRegistry;

    /// Canned assist backend for lifecycle tests.
    struct StubAssist {
        parsed: Option<ParsedTask>,
    }

    #[async_trait]
    impl AssistClient for StubAssist {
        async fn enhance_task(&self, _: &str, _: &str) -> Result<Enhancement> {
            Err(Error::InvalidAiResponse("not stubbed".into()))
        }

        async fn suggest_subtasks(&self, _: &str, _: &str) -> Result<SubtaskSuggestions> {
            Err(Error::InvalidAiResponse("not stubbed".into()))
        }

        async fn explain_risk(&self, risk: &RiskReport) -> Result<RiskExplanation> {
            Ok(RiskExplanation {
                summary: format!("score {}", risk.score),
                reasons: vec!["deadline".into()],
                suggested_action: "split the work".into(),
            })
        }

        async fn parse_task(&self, _: &str, _: &[UserView]) -> Result<ParsedTask> {
            self.parsed
                .clone()
                .ok_or_else(|| Error::InvalidAiResponse("not stubbed".into()))
        }
    }

    struct Fixture {
        lifecycle: TaskLifecycle,
        stages: StageRegistry,
        store: Arc<Store>,
        notifier: NotificationDispatcher,
        creator: AuthUser,
        assignee: AuthUser,
        _dir: tempfile::TempDir,
    }

    async fn fixture_with(parsed: Option<ParsedTask>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path());
        let hub = Arc::new(RealtimeHub::new());
        let activity = ActivityLog::new(Arc::clone(&store), Arc::clone(&hub));
        let notifier = NotificationDispatcher::new(Arc::clone(&store), Arc::clone(&hub));
        let lifecycle = TaskLifecycle::new(
            Arc::clone(&store),
            activity,
            notifier.clone(),
            Arc::new(StubAssist { parsed }),
        );
        let stages = StageRegistry::new(Arc::clone(&store));

        let creator = add_user(&store, "Grace", Role::User).await;
        let assignee = add_user(&store, "Alan", Role::User).await;

        Fixture {
            lifecycle,
            stages,
            store,
            notifier,
            creator,
            assignee,
            _dir: dir,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(None).await
    }

    async fn add_user(store: &Store, name: &str, role: Role) -> AuthUser {
        let user = store
            .users
            .insert(User {
                id: Uuid::new_v4(),
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: String::new(),
                role,
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

    fn create_input(fx: &Fixture, stage: Uuid, title: &str) -> CreateTaskInput {
        CreateTaskInput {
            title: title.into(),
            description: None,
            priority: None,
            assigned_to: fx.assignee.id,
            due_date: None,
            workflow_stage: stage,
        }
    }

    #[tokio::test]
    async fn create_derives_status_and_fans_out() {
        let fx = fixture().await;
        let stage = fx.stages.create("In Progress", None).await.unwrap();

        let view = fx
            .lifecycle
            .create(create_input(&fx, stage.id, "Port the scheduler"), &fx.creator)
            .await
            .unwrap();

        assert_eq!(view.status, TaskStatus::InProgress);
        assert_eq!(view.assigned_to.as_ref().unwrap().name, "Alan");

        let notifications = fx.notifier.list_for(fx.assignee.id, 10).await;
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].message.contains("Port the scheduler"));

        let activity = fx.store.activity.list().await;
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].action, "TASK_CREATED");
    }

    #[tokio::test]
    async fn create_rejects_missing_title_and_unknown_stage() {
        let fx = fixture().await;
        let stage = fx.stages.create("Todo", None).await.unwrap();

        let err = fx
            .lifecycle
            .create(create_input(&fx, stage.id, "   "), &fx.creator)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = fx
            .lifecycle
            .create(create_input(&fx, Uuid::new_v4(), "Valid"), &fx.creator)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Validation happens before any side effect.
        assert!(fx.store.activity.list().await.is_empty());
        assert!(fx.notifier.list_for(fx.assignee.id, 10).await.is_empty());
    }

    #[tokio::test]
    async fn update_is_creator_or_admin_only() {
        let fx = fixture().await;
        let stage = fx.stages.create("Todo", None).await.unwrap();
        let task = fx
            .lifecycle
            .create(create_input(&fx, stage.id, "Guarded"), &fx.creator)
            .await
            .unwrap();

        let patch = UpdateTaskInput {
            priority: Some(Priority::High),
            ..Default::default()
        };
        let err = fx
            .lifecycle
            .update(task.id, patch, &fx.assignee)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let admin = add_user(&fx.store, "Root", Role::Admin).await;
        let updated = fx
            .lifecycle
            .update(
                task.id,
                UpdateTaskInput {
                    priority: Some(Priority::High),
                    ..Default::default()
                },
                &admin,
            )
            .await
            .unwrap();
        assert_eq!(updated.priority, Priority::High);
        assert!(updated.updated_at > task.updated_at);
        // Unpatched fields survive the merge.
        assert_eq!(updated.title, "Guarded");
    }

    #[tokio::test]
    async fn delete_retains_activity_and_notifications() {
        let fx = fixture().await;
        let stage = fx.stages.create("Todo", None).await.unwrap();
        let task = fx
            .lifecycle
            .create(create_input(&fx, stage.id, "Ephemeral"), &fx.creator)
            .await
            .unwrap();

        fx.lifecycle.delete(task.id, &fx.creator).await.unwrap();
        assert!(fx.store.tasks.get(task.id).await.is_none());

        // History outlives the task: entries keep the dangling reference.
        let activity = fx
            .store
            .activity
            .find(|e| e.task_id == Some(task.id))
            .await;
        assert_eq!(activity.len(), 2); // TASK_CREATED + TASK_DELETED
        let notifications = fx.notifier.list_for(fx.assignee.id, 10).await;
        assert_eq!(notifications.len(), 2);
    }

    #[tokio::test]
    async fn assignee_can_move_but_not_reassign() {
        let fx = fixture().await;
        let todo = fx.stages.create("Todo", None).await.unwrap();
        let done = fx.stages.create("Completed", None).await.unwrap();
        let task = fx
            .lifecycle
            .create(create_input(&fx, todo.id, "Asymmetric"), &fx.creator)
            .await
            .unwrap();

        // The assignee may move the task between stages...
        let moved = fx
            .lifecycle
            .change_stage(task.id, done.id, &fx.assignee)
            .await
            .unwrap();
        assert_eq!(moved.status, TaskStatus::Completed);

        // ...but may not hand it to someone else.
        let other = add_user(&fx.store, "Eve", Role::User).await;
        let err = fx
            .lifecycle
            .reassign(task.id, other.id, &fx.assignee)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        // The creator may.
        let reassigned = fx
            .lifecycle
            .reassign(task.id, other.id, &fx.creator)
            .await
            .unwrap();
        assert_eq!(reassigned.assigned_to.as_ref().unwrap().id, other.id);
    }

    #[tokio::test]
    async fn change_stage_requires_an_existing_stage() {
        let fx = fixture().await;
        let todo = fx.stages.create("Todo", None).await.unwrap();
        let task = fx
            .lifecycle
            .create(create_input(&fx, todo.id, "Stuck"), &fx.creator)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .change_stage(task.id, Uuid::new_v4(), &fx.creator)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn subtask_mutations_touch_only_their_target() {
        let fx = fixture().await;
        let stage = fx.stages.create("Todo", None).await.unwrap();
        let task = fx
            .lifecycle
            .create(create_input(&fx, stage.id, "Parent"), &fx.creator)
            .await
            .unwrap();

        fx.lifecycle.add_subtask(task.id, "first").await.unwrap();
        fx.lifecycle.add_subtask(task.id, "second").await.unwrap();
        let subtasks = fx.lifecycle.add_subtask(task.id, "third").await.unwrap();
        assert_eq!(
            subtasks.iter().map(|s| s.title.as_str()).collect::<Vec<_>>(),
            vec!["first", "second", "third"]
        );

        let second = subtasks[1].id;
        let after_update = fx
            .lifecycle
            .update_subtask(task.id, second, None, Some(true))
            .await
            .unwrap();
        assert!(after_update[1].is_done);
        assert!(!after_update[0].is_done);
        assert!(!after_update[2].is_done);
        assert_eq!(after_update[1].title, "second");

        let after_delete = fx.lifecycle.delete_subtask(task.id, second).await.unwrap();
        assert_eq!(
            after_delete
                .iter()
                .map(|s| s.title.as_str())
                .collect::<Vec<_>>(),
            vec!["first", "third"]
        );

        let err = fx
            .lifecycle
            .update_subtask(task.id, second, None, Some(false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn list_ands_filters_and_matches_title_case_insensitively() {
        let fx = fixture().await;
        let todo = fx.stages.create("Todo", None).await.unwrap();
        let progress = fx.stages.create("In Progress", None).await.unwrap();

        fx.lifecycle
            .create(create_input(&fx, todo.id, "Fix parser bug"), &fx.creator)
            .await
            .unwrap();
        fx.lifecycle
            .create(create_input(&fx, progress.id, "Parser benchmarks"), &fx.creator)
            .await
            .unwrap();
        fx.lifecycle
            .create(create_input(&fx, todo.id, "Write docs"), &fx.creator)
            .await
            .unwrap();

        let filter = TaskFilter {
            status: Some(TaskStatus::Todo),
            search: Some("PARSER".into()),
            ..Default::default()
        };
        let hits = fx.lifecycle.list(&filter).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Fix parser bug");

        // Unfiltered list is newest-first.
        let all = fx.lifecycle.list(&TaskFilter::default()).await;
        assert_eq!(all[0].title, "Write docs");
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn nlp_create_resolves_assignee_and_pins_todo() {
        let parsed = ParsedTask {
            title: "Prepare release notes".into(),
            description: Some("for 1.2".into()),
            priority: Some(Priority::High),
            assignee_name: Some("alan".into()),
            due_date: Some("2026-09-01".into()),
        };
        let fx = fixture_with(Some(parsed)).await;
        // A "Completed" stage being first must not affect the pinned status.
        fx.stages.create("Completed", None).await.unwrap();

        let view = fx
            .lifecycle
            .create_from_text("ask Alan to prep release notes by sept 1", &fx.creator)
            .await
            .unwrap();

        assert_eq!(view.status, TaskStatus::Todo);
        assert_eq!(view.assigned_to.as_ref().unwrap().name, "Alan");
        assert_eq!(view.priority, Priority::High);
        assert!(view.due_date.is_some());

        let activity = fx.store.activity.list().await;
        assert_eq!(activity[0].action, "TASK_CREATED_NLP");
    }

    #[tokio::test]
    async fn nlp_create_fails_without_assignee_or_stage() {
        let parsed = ParsedTask {
            title: "Orphan".into(),
            description: None,
            priority: None,
            assignee_name: Some("Nobody".into()),
            due_date: None,
        };
        let fx = fixture_with(Some(parsed.clone())).await;
        fx.stages.create("Todo", None).await.unwrap();

        let err = fx
            .lifecycle
            .create_from_text("give this to nobody", &fx.creator)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Known assignee but an empty board: also invalid input.
        let parsed = ParsedTask {
            assignee_name: Some("Alan".into()),
            ..parsed
        };
        let fx = fixture_with(Some(parsed)).await;
        let err = fx
            .lifecycle
            .create_from_text("give this to alan", &fx.creator)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn risk_report_combines_score_and_explanation() {
        let fx = fixture().await;
        let stage = fx.stages.create("Todo", None).await.unwrap();
        let mut input = create_input(&fx, stage.id, "Risky");
        input.due_date = Some(Utc::now() - chrono::Duration::days(1));
        input.priority = Some(Priority::Critical);
        let task = fx.lifecycle.create(input, &fx.creator).await.unwrap();

        let assessment = fx.lifecycle.risk_report(task.id).await.unwrap();
        assert!(assessment.score >= 66);
        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.summary, format!("score {}", assessment.score));
        assert_eq!(assessment.suggested_action, "split the work");
    }

    #[test]
    fn due_date_parsing_accepts_both_formats_and_null() {
        assert!(parse_due_date("2026-09-01").is_some());
        assert!(parse_due_date("2026-09-01T10:00:00Z").is_some());
        assert!(parse_due_date("null").is_none());
        assert!(parse_due_date("").is_none());
        assert!(parse_due_date("next tuesday").is_none());
    }
}
