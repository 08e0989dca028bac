//! Task store trait definitions.

use async_trait::async_trait;
use entities::{CapturedImage, Task};

use crate::StoreResult;

/// A partial update applied to an existing task.
///
/// Only the fields that are set are written; an empty update is a no-op.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    /// New task text.
    pub text: Option<String>,
    /// New completion state.
    pub completed: Option<bool>,
    /// Replacement image attachment.
    pub image: Option<CapturedImage>,
}

impl TaskUpdate {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none() && self.image.is_none()
    }

    /// Sets the task text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the completion state.
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Sets a replacement image attachment.
    pub fn with_image(mut self, image: CapturedImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Trait for task storage backends.
///
/// Every operation other than `initialize` fails with `NotInitialized`
/// when called before the first successful `initialize` or after `close`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Opens the backing medium and prepares the schema. Idempotent and
    /// safe to call again after `close`.
    async fn initialize(&self) -> StoreResult<()>;

    /// Persists a new task and returns its assigned identifier.
    ///
    /// Identifiers and creation timestamps are backend-assigned; callers
    /// never supply them.
    async fn add_task(&self, text: &str, image: Option<&CapturedImage>) -> StoreResult<i64>;

    /// Returns all tasks, newest first. An empty store yields an empty
    /// vector, never an error.
    async fn get_all_tasks(&self) -> StoreResult<Vec<Task>>;

    /// Returns a task by identifier.
    async fn get_task(&self, id: i64) -> StoreResult<Option<Task>>;

    /// Applies a partial update. Fails with `NotFound` if the task is
    /// absent; an empty update returns without touching storage.
    async fn update_task(&self, id: i64, update: &TaskUpdate) -> StoreResult<()>;

    /// Flips a task's completion state. Fails with `NotFound` if absent.
    async fn toggle_completion(&self, id: i64) -> StoreResult<()>;

    /// Deletes a task. Deleting a missing task is a successful no-op.
    async fn delete_task(&self, id: i64) -> StoreResult<()>;

    /// Unconditionally removes every stored task.
    async fn clear_all(&self) -> StoreResult<()>;

    /// Releases backend resources. Safe to call more than once.
    async fn close(&self) -> StoreResult<()>;
}
