//! JSON-file document store.
//!
//! Each entity type lives in its own [`Collection`]: an in-memory map
//! guarded by an async `RwLock`, persisted as pretty JSON at
//! `<data_dir>/<name>.json` after every write. A failed disk write is
//! logged and does not fail the operation; consistency relies on
//! per-collection write serialization only, and the auxiliary side effects
//! layered on top (notifications, activity) are explicitly best-effort.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ActivityEntry, Comment, Notification, Task, User, WorkflowStage};

/// A storable entity with a stable id.
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// File stem for the collection (`users`, `tasks`, ...).
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

impl Document for User {
    const COLLECTION: &'static str = "users";
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for Task {
    const COLLECTION: &'static str = "tasks";
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for WorkflowStage {
    const COLLECTION: &'static str = "stages";
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for ActivityEntry {
    const COLLECTION: &'static str = "activity";
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for Comment {
    const COLLECTION: &'static str = "comments";
    fn id(&self) -> Uuid {
        self.id
    }
}

/// In-memory collection with JSON persistence.
#[derive(Debug)]
pub struct Collection<T: Document> {
    docs: RwLock<HashMap<Uuid, T>>,
    path: PathBuf,
}

impl<T: Document> Collection<T> {
    /// Open a collection, loading any existing documents from disk.
    fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(format!("{}.json", T::COLLECTION));
        let docs = match Self::load_from_path(&path) {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(
                    "Failed to load {} from {}: {}, starting empty",
                    T::COLLECTION,
                    path.display(),
                    e
                );
                HashMap::new()
            }
        };

        Self {
            docs: RwLock::new(docs),
            path,
        }
    }

    fn load_from_path(path: &Path) -> Result<HashMap<Uuid, T>, std::io::Error> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let docs: Vec<T> = serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        Ok(docs.into_iter().map(|d| (d.id(), d)).collect())
    }

    /// Persist the collection. Failures are logged, never propagated.
    async fn save_to_disk(&self) {
        let contents = {
            let docs = self.docs.read().await;
            let all: Vec<&T> = docs.values().collect();
            match serde_json::to_string_pretty(&all) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to serialize {}: {}", T::COLLECTION, e);
                    return;
                }
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::error!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }

        if let Err(e) = std::fs::write(&self.path, contents) {
            tracing::error!(
                "Failed to save {} to {}: {}",
                T::COLLECTION,
                self.path.display(),
                e
            );
        }
    }

    pub async fn list(&self) -> Vec<T> {
        let docs = self.docs.read().await;
        docs.values().cloned().collect()
    }

    pub async fn get(&self, id: Uuid) -> Option<T> {
        let docs = self.docs.read().await;
        docs.get(&id).cloned()
    }

    pub async fn find(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let docs = self.docs.read().await;
        docs.values().filter(|d| pred(d)).cloned().collect()
    }

    pub async fn count(&self, pred: impl Fn(&T) -> bool) -> usize {
        let docs = self.docs.read().await;
        docs.values().filter(|d| pred(d)).count()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn insert(&self, doc: T) -> T {
        {
            let mut docs = self.docs.write().await;
            docs.insert(doc.id(), doc.clone());
        }
        self.save_to_disk().await;
        doc
    }

    /// Apply `f` to the document with the given id, persisting the result.
    /// Returns the updated document, or `None` if the id is unknown.
    pub async fn modify(&self, id: Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let updated = {
            let mut docs = self.docs.write().await;
            let doc = docs.get_mut(&id)?;
            f(doc);
            Some(doc.clone())
        };

        if updated.is_some() {
            self.save_to_disk().await;
        }
        updated
    }

    /// Apply `f` to every document matching `pred`. Returns how many matched.
    pub async fn modify_all(
        &self,
        pred: impl Fn(&T) -> bool,
        mut f: impl FnMut(&mut T),
    ) -> usize {
        let touched = {
            let mut docs = self.docs.write().await;
            let mut touched = 0;
            for doc in docs.values_mut().filter(|d| pred(d)) {
                f(doc);
                touched += 1;
            }
            touched
        };

        if touched > 0 {
            self.save_to_disk().await;
        }
        touched
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let existed = {
            let mut docs = self.docs.write().await;
            docs.remove(&id).is_some()
        };

        if existed {
            self.save_to_disk().await;
        }
        existed
    }
}

/// All collections of the task board.
#[derive(Debug)]
pub struct Store {
    pub users: Collection<User>,
    pub tasks: Collection<Task>,
    pub stages: Collection<WorkflowStage>,
    pub activity: Collection<ActivityEntry>,
    pub notifications: Collection<Notification>,
    pub comments: Collection<Comment>,
}

impl Store {
    /// Open every collection under `data_dir`.
    pub fn open(data_dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            users: Collection::open(data_dir),
            tasks: Collection::open(data_dir),
            stages: Collection::open(data_dir),
            activity: Collection::open(data_dir),
            notifications: Collection::open(data_dir),
            comments: Collection::open(data_dir),
        })
    }
}
