//! Workflow stage registry.
//!
//! Stages are a flat ordered list (not a graph); `order` values stay a
//! dense 1..N sequence across create, delete, and reorder. A stage also
//! determines the canonical status of every task sitting in it, via
//! [`derived_status`].

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{TaskStatus, WorkflowStage};
use crate::store::Store;

const DEFAULT_STAGE_COLOR: &str = "#3b82f6";

/// Map a stage name to the task status it implies.
///
/// Case-insensitive substring match, in priority order: a name containing
/// both "complete" and "progress" resolves to completed. Evaluated fresh at
/// every stage change; renaming a stage does not reclassify tasks already
/// in it.
pub fn derived_status(stage_name: &str) -> TaskStatus {
    let name = stage_name.to_lowercase();
    if name.contains("complete") {
        TaskStatus::Completed
    } else if name.contains("progress") {
        TaskStatus::InProgress
    } else if name.contains("todo") {
        TaskStatus::Todo
    } else {
        TaskStatus::Backlog
    }
}

/// Stage CRUD and ordering, backed by the shared store.
#[derive(Clone)]
pub struct StageRegistry {
    store: Arc<Store>,
}

impl StageRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// All stages, sorted by `order` ascending.
    pub async fn list(&self) -> Vec<WorkflowStage> {
        let mut stages = self.store.stages.list().await;
        stages.sort_by_key(|s| s.order);
        stages
    }

    pub async fn get(&self, id: Uuid) -> Result<WorkflowStage> {
        self.store
            .stages
            .get(id)
            .await
            .ok_or_else(|| Error::not_found(format!("Stage {} not found", id)))
    }

    /// Create a stage at the end of the sequence.
    pub async fn create(&self, name: &str, color: Option<String>) -> Result<WorkflowStage> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("Stage name is required"));
        }

        let order = self.store.stages.len().await as u32 + 1;
        let stage = WorkflowStage {
            id: Uuid::new_v4(),
            name: name.to_string(),
            order,
            color: color.unwrap_or_else(|| DEFAULT_STAGE_COLOR.to_string()),
            created_at: Utc::now(),
        };

        Ok(self.store.stages.insert(stage).await)
    }

    /// Partial update of name and/or color. Order is not addressable here.
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<WorkflowStage> {
        if let Some(name) = &name {
            if name.trim().is_empty() {
                return Err(Error::invalid_input("Stage name cannot be empty"));
            }
        }

        self.store
            .stages
            .modify(id, |stage| {
                if let Some(name) = name {
                    stage.name = name.trim().to_string();
                }
                if let Some(color) = color {
                    stage.color = color;
                }
            })
            .await
            .ok_or_else(|| Error::not_found(format!("Stage {} not found", id)))
    }

    /// Delete a stage, recompacting the remaining orders to a dense 1..N
    /// sequence. Fails with Conflict while any task still references it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.store.stages.get(id).await.is_none() {
            return Err(Error::not_found(format!("Stage {} not found", id)));
        }

        let referencing = self.store.tasks.count(|t| t.workflow_stage == id).await;
        if referencing > 0 {
            return Err(Error::conflict(
                "Cannot delete a stage that has assigned tasks",
            ));
        }

        let _ = self.store.stages.remove(id).await;

        // Recompact: stable relative order of the survivors.
        let remaining = self.list().await;
        for (index, stage) in remaining.iter().enumerate() {
            let _ = self
                .store
                .stages
                .modify(stage.id, |s| s.order = index as u32 + 1)
                .await;
        }

        Ok(())
    }

    /// Reassign `order = position + 1` for the given sequence.
    ///
    /// The list must cover the full set of existing stage ids exactly once;
    /// anything else fails with InvalidInput before any write. (A partial
    /// list would leave unlisted stages with stale, possibly duplicate
    /// order values.)
    pub async fn reorder(&self, ordered_ids: &[Uuid]) -> Result<Vec<WorkflowStage>> {
        let existing = self.store.stages.list().await;

        let mut seen = std::collections::HashSet::new();
        for id in ordered_ids {
            if !seen.insert(*id) {
                return Err(Error::invalid_input(format!(
                    "Duplicate stage id in orderedIds: {}",
                    id
                )));
            }
            if !existing.iter().any(|s| s.id == *id) {
                return Err(Error::invalid_input(format!(
                    "Unknown stage id in orderedIds: {}",
                    id
                )));
            }
        }
        if ordered_ids.len() != existing.len() {
            return Err(Error::invalid_input(
                "orderedIds must list every existing stage exactly once",
            ));
        }

        for (index, id) in ordered_ids.iter().enumerate() {
            let _ = self
                .store
                .stages
                .modify(*id, |s| s.order = index as u32 + 1)
                .await;
        }

        Ok(self.list().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, Task};

    fn registry() -> (StageRegistry, Arc<Store>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path());
        (StageRegistry::new(Arc::clone(&store)), store, dir)
    }

    async fn task_in_stage(store: &Store, stage: Uuid) -> Task {
        let now = Utc::now();
        store
            .tasks
            .insert(Task {
                id: Uuid::new_v4(),
                title: "t".into(),
                description: String::new(),
                priority: Priority::Medium,
                status: TaskStatus::Todo,
                created_by: Uuid::new_v4(),
                assigned_to: Uuid::new_v4(),
                due_date: None,
                workflow_stage: stage,
                subtasks: Vec::new(),
                created_at: now,
                updated_at: now,
            })
            .await
    }

    #[test]
    fn status_derivation_priority_order() {
        assert_eq!(derived_status("Completed"), TaskStatus::Completed);
        assert_eq!(derived_status("DONE / complete"), TaskStatus::Completed);
        assert_eq!(derived_status("In Progress"), TaskStatus::InProgress);
        assert_eq!(derived_status("To-Do? todo"), TaskStatus::Todo);
        assert_eq!(derived_status("Icebox"), TaskStatus::Backlog);
        // A name matching several rules resolves by priority order.
        assert_eq!(
            derived_status("Progress complete"),
            TaskStatus::Completed
        );
        assert_eq!(derived_status("todo in progress"), TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn create_appends_with_dense_order() {
        let (registry, _store, _dir) = registry();

        let a = registry.create("Backlog", None).await.unwrap();
        let b = registry.create("In Progress", None).await.unwrap();
        assert_eq!(a.order, 1);
        assert_eq!(b.order, 2);
        assert_eq!(a.color, DEFAULT_STAGE_COLOR);

        let names: Vec<String> = registry.list().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Backlog", "In Progress"]);
    }

    #[tokio::test]
    async fn delete_referenced_stage_is_a_conflict() {
        let (registry, store, _dir) = registry();
        let stage = registry.create("Todo", None).await.unwrap();
        let _task = task_in_stage(&store, stage.id).await;

        let err = registry.delete(stage.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(store.stages.get(stage.id).await.is_some());
    }

    #[tokio::test]
    async fn delete_recompacts_orders() {
        let (registry, _store, _dir) = registry();
        let a = registry.create("A", None).await.unwrap();
        let b = registry.create("B", None).await.unwrap();
        let c = registry.create("C", None).await.unwrap();

        registry.delete(b.id).await.unwrap();

        let stages = registry.list().await;
        assert_eq!(
            stages.iter().map(|s| (s.id, s.order)).collect::<Vec<_>>(),
            vec![(a.id, 1), (c.id, 2)]
        );
    }

    #[tokio::test]
    async fn reorder_requires_the_full_id_set() {
        let (registry, _store, _dir) = registry();
        let a = registry.create("A", None).await.unwrap();
        let b = registry.create("B", None).await.unwrap();

        // Partial list rejected before any write.
        let err = registry.reorder(&[b.id]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(registry.get(a.id).await.unwrap().order, 1);

        // Unknown id rejected.
        let err = registry.reorder(&[b.id, Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Full set applies position + 1 exactly.
        let stages = registry.reorder(&[b.id, a.id]).await.unwrap();
        assert_eq!(
            stages.iter().map(|s| (s.id, s.order)).collect::<Vec<_>>(),
            vec![(b.id, 1), (a.id, 2)]
        );
    }

    #[tokio::test]
    async fn reorder_preserves_other_fields() {
        let (registry, _store, _dir) = registry();
        let a = registry.create("A", Some("#111111".into())).await.unwrap();
        let b = registry.create("B", Some("#222222".into())).await.unwrap();

        let stages = registry.reorder(&[b.id, a.id]).await.unwrap();
        let moved_a = stages.iter().find(|s| s.id == a.id).unwrap();
        assert_eq!(moved_a.name, "A");
        assert_eq!(moved_a.color, "#111111");
        assert_eq!(moved_a.created_at, a.created_at);
    }
}
