//! Persistence façade choosing a backend once at construction time.

use std::{path::PathBuf, sync::Arc};

use entities::{CapturedImage, Task};
use tracing::debug;

use crate::{
    FsImageLoader, ImageLoader, KeyValueStore, SqliteTaskStore, StoreResult, TaskStore,
    TaskUpdate, WebTaskStore,
};

/// Backend wiring for the task service.
pub enum BackendConfig {
    /// Browser runtime: one JSON document in a key-value store.
    Web {
        /// The browser-provided persistent key-value store.
        store: Arc<dyn KeyValueStore>,
        /// Loader used to inline capture images before commit.
        images: Arc<dyn ImageLoader>,
    },
    /// Native runtime: embedded SQLite database file.
    Native {
        /// Path of the database file.
        db_path: PathBuf,
    },
}

/// Service exposing uniform task persistence over either backend.
///
/// The backend is selected once here and held as the service's sole
/// dependency; callers never see backend-specific representations.
/// Lifecycle: `initialize()` -> use -> `close()`, scoped to the
/// application session.
pub struct TaskService {
    store: Box<dyn TaskStore>,
}

impl TaskService {
    /// Creates a service with the backend selected by `config`.
    pub fn new(config: BackendConfig) -> Self {
        let store: Box<dyn TaskStore> = match config {
            BackendConfig::Web { store, images } => {
                debug!("task service using web key-value backend");
                Box::new(WebTaskStore::new(store, images))
            }
            BackendConfig::Native { db_path } => {
                debug!("task service using sqlite backend");
                Box::new(SqliteTaskStore::new(db_path))
            }
        };
        Self { store }
    }

    /// Maps the platform-detection boolean onto a backend: web runtimes
    /// get the key-value backend, everything else the SQLite backend.
    pub fn for_platform(
        is_web: bool,
        store: Arc<dyn KeyValueStore>,
        db_path: impl Into<PathBuf>,
    ) -> Self {
        if is_web {
            Self::new(BackendConfig::Web {
                store,
                images: Arc::new(FsImageLoader),
            })
        } else {
            Self::new(BackendConfig::Native {
                db_path: db_path.into(),
            })
        }
    }

    /// Idempotent setup of the chosen backend.
    pub async fn initialize(&self) -> StoreResult<()> {
        self.store.initialize().await
    }

    /// Persists a new task and returns its identifier.
    ///
    /// Enforcing non-empty text is the caller's contract; this layer
    /// accepts whatever it is given without crashing.
    pub async fn add_task(&self, text: &str, image: Option<&CapturedImage>) -> StoreResult<i64> {
        self.store.add_task(text, image).await
    }

    /// Returns all tasks, newest first, with display-ready image
    /// references.
    pub async fn get_all_tasks(&self) -> StoreResult<Vec<Task>> {
        self.store.get_all_tasks().await
    }

    /// Returns a task by identifier.
    pub async fn get_task(&self, id: i64) -> StoreResult<Option<Task>> {
        self.store.get_task(id).await
    }

    /// Applies a partial update to a task.
    pub async fn update_task(&self, id: i64, update: &TaskUpdate) -> StoreResult<()> {
        self.store.update_task(id, update).await
    }

    /// Flips a task's completion state.
    pub async fn toggle_completion(&self, id: i64) -> StoreResult<()> {
        self.store.toggle_completion(id).await
    }

    /// Deletes a task; missing identifiers are a no-op.
    pub async fn delete_task(&self, id: i64) -> StoreResult<()> {
        self.store.delete_task(id).await
    }

    /// Empties the store. Test/reset scenarios only.
    pub async fn clear_all(&self) -> StoreResult<()> {
        self.store.clear_all().await
    }

    /// Releases backend resources. Safe to call more than once.
    pub async fn close(&self) -> StoreResult<()> {
        self.store.close().await
    }
}
