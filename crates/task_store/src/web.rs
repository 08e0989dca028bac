//! Web backend: the whole task collection as one JSON document in a
//! key-value store.
//!
//! Every mutation is a read-modify-write of that single document. There is
//! no row-level locking: writes from this instance are serialized behind
//! one mutex, but overlapping writers on other instances of the same store
//! race and the last writer wins. Storage cost grows with the inlined
//! image bytes across all tasks.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{CapturedImage, Task};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    inline_data_uri, ImageLoader, KeyValueStore, StoreError, StoreResult, TaskStore, TaskUpdate,
};

/// Fixed key the whole task collection is stored under.
const TASKS_KEY: &str = "tasks";

/// Stored record layout for the web backend.
///
/// `image_data` carries the inline `data:` URI; `image_path` keeps the
/// capture-time reference for fallback display.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTask {
    id: i64,
    text: String,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    completed: bool,
    created_at: DateTime<Utc>,
}

impl StoredTask {
    /// Resolves the display reference inline-first. The transient capture
    /// path is only a fallback and may be dead after a reload.
    fn into_task(self) -> Task {
        let image_display = self.image_data.or_else(|| self.image_path.clone());
        Task {
            id: self.id,
            text: self.text,
            image_filepath: self.image_path,
            image_display,
            completed: self.completed,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Default)]
struct WebState {
    open: bool,
    last_id: i64,
}

/// Task store backed by one JSON document in a [`KeyValueStore`].
pub struct WebTaskStore {
    store: Arc<dyn KeyValueStore>,
    images: Arc<dyn ImageLoader>,
    state: Mutex<WebState>,
}

impl WebTaskStore {
    /// Creates a web task store over the given key-value store and image
    /// loader.
    pub fn new(store: Arc<dyn KeyValueStore>, images: Arc<dyn ImageLoader>) -> Self {
        Self {
            store,
            images,
            state: Mutex::new(WebState::default()),
        }
    }

    /// Reads the whole stored collection. A missing or malformed document
    /// decodes as the empty collection.
    async fn read_all(&self) -> StoreResult<Vec<StoredTask>> {
        let Some(raw) = self.store.get(TASKS_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(tasks) => Ok(tasks),
            Err(e) => {
                warn!("stored task document is malformed, treating as empty: {e}");
                Ok(Vec::new())
            }
        }
    }

    async fn write_all(&self, tasks: &[StoredTask]) -> StoreResult<()> {
        let raw = serde_json::to_string(tasks).map_err(StoreError::Serialization)?;
        self.store.set(TASKS_KEY, &raw).await?;
        Ok(())
    }

    /// Assigns the next identifier: wall-clock milliseconds, perturbed to
    /// stay strictly monotonic so rapid successive calls within one
    /// process tick never collide.
    fn next_id(state: &mut WebState) -> i64 {
        let candidate = Utc::now().timestamp_millis();
        state.last_id = if candidate > state.last_id {
            candidate
        } else {
            state.last_id + 1
        };
        state.last_id
    }

    /// Inline-encodes the capture image. Failure degrades to no inline
    /// data; the task is still saved.
    async fn inline_image(&self, image: &CapturedImage) -> Option<String> {
        let reference = image.load_reference()?;
        match self.images.load(reference).await {
            Ok(bytes) => Some(inline_data_uri(&bytes)),
            Err(e) => {
                warn!("failed to inline image {reference}: {e}");
                None
            }
        }
    }

    fn sort_newest_first(tasks: &mut [StoredTask]) {
        tasks.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
    }
}

#[async_trait]
impl TaskStore for WebTaskStore {
    async fn initialize(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        // Reachability probe; an unreadable store is fatal for the session.
        self.store
            .get(TASKS_KEY)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        state.open = true;
        debug!("web task store initialized");
        Ok(())
    }

    async fn add_task(&self, text: &str, image: Option<&CapturedImage>) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        if !state.open {
            return Err(StoreError::NotInitialized);
        }

        let (image_path, image_data) = match image {
            Some(image) => match self.inline_image(image).await {
                Some(data) => (image.load_reference().map(String::from), Some(data)),
                // Conversion failed: degrade to an empty image reference;
                // the task itself is still saved.
                None => (None, None),
            },
            None => (None, None),
        };

        let id = Self::next_id(&mut state);
        let mut tasks = self.read_all().await?;
        tasks.push(StoredTask {
            id,
            text: text.to_string(),
            image_path,
            image_data,
            completed: false,
            created_at: Utc::now(),
        });
        self.write_all(&tasks).await?;
        Ok(id)
    }

    async fn get_all_tasks(&self) -> StoreResult<Vec<Task>> {
        let state = self.state.lock().await;
        if !state.open {
            return Err(StoreError::NotInitialized);
        }
        let mut tasks = self.read_all().await?;
        Self::sort_newest_first(&mut tasks);
        Ok(tasks.into_iter().map(StoredTask::into_task).collect())
    }

    async fn get_task(&self, id: i64) -> StoreResult<Option<Task>> {
        let state = self.state.lock().await;
        if !state.open {
            return Err(StoreError::NotInitialized);
        }
        let tasks = self.read_all().await?;
        Ok(tasks
            .into_iter()
            .find(|t| t.id == id)
            .map(StoredTask::into_task))
    }

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> StoreResult<()> {
        let state = self.state.lock().await;
        if !state.open {
            return Err(StoreError::NotInitialized);
        }
        if update.is_empty() {
            return Ok(());
        }

        let mut tasks = self.read_all().await?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Err(StoreError::NotFound { id });
        };
        if let Some(text) = &update.text {
            task.text = text.clone();
        }
        if let Some(completed) = update.completed {
            task.completed = completed;
        }
        if let Some(image) = &update.image {
            // A replacement reference is stored as supplied; inlining is an
            // add-time concern.
            task.image_path = image.load_reference().map(String::from);
            task.image_data = None;
        }
        self.write_all(&tasks).await
    }

    async fn toggle_completion(&self, id: i64) -> StoreResult<()> {
        let state = self.state.lock().await;
        if !state.open {
            return Err(StoreError::NotInitialized);
        }
        let mut tasks = self.read_all().await?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Err(StoreError::NotFound { id });
        };
        task.completed = !task.completed;
        self.write_all(&tasks).await
    }

    async fn delete_task(&self, id: i64) -> StoreResult<()> {
        let state = self.state.lock().await;
        if !state.open {
            return Err(StoreError::NotInitialized);
        }
        let mut tasks = self.read_all().await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            // Missing task: idempotent no-op, skip the write.
            return Ok(());
        }
        self.write_all(&tasks).await
    }

    async fn clear_all(&self) -> StoreResult<()> {
        let state = self.state.lock().await;
        if !state.open {
            return Err(StoreError::NotInitialized);
        }
        self.write_all(&[]).await
    }

    async fn close(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.open {
            state.open = false;
            debug!("web task store closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::{FsImageLoader, MemoryKeyValueStore};

    struct FailingImageLoader;

    #[async_trait]
    impl ImageLoader for FailingImageLoader {
        async fn load(&self, reference: &str) -> StoreResult<Vec<u8>> {
            Err(StoreError::image_conversion(format!(
                "{reference}: unreachable"
            )))
        }
    }

    struct StaticImageLoader;

    #[async_trait]
    impl ImageLoader for StaticImageLoader {
        async fn load(&self, _reference: &str) -> StoreResult<Vec<u8>> {
            Ok(vec![0xff, 0xd8, 0xff])
        }
    }

    struct BrokenKeyValueStore;

    #[async_trait]
    impl KeyValueStore for BrokenKeyValueStore {
        async fn get(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::other("storage disabled"))
        }

        async fn set(&self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::other("storage disabled"))
        }

        async fn remove(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::other("storage disabled"))
        }
    }

    fn web_store(images: Arc<dyn ImageLoader>) -> (Arc<MemoryKeyValueStore>, WebTaskStore) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = WebTaskStore::new(kv.clone(), images);
        (kv, store)
    }

    #[tokio::test]
    async fn initialize_fails_when_store_is_unreachable() {
        let store = WebTaskStore::new(Arc::new(BrokenKeyValueStore), Arc::new(FsImageLoader));
        let err = store.initialize().await;
        assert!(matches!(err, Err(StoreError::StorageUnavailable { .. })));
    }

    #[tokio::test]
    async fn operations_require_initialization() {
        let (_, store) = web_store(Arc::new(FsImageLoader));
        assert!(matches!(
            store.get_all_tasks().await,
            Err(StoreError::NotInitialized)
        ));
        assert!(matches!(
            store.add_task("x", None).await,
            Err(StoreError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn rapid_inserts_get_unique_ids_and_newest_first_order() {
        let (_, store) = web_store(Arc::new(FsImageLoader));
        store.initialize().await.unwrap();

        let a = store.add_task("a", None).await.unwrap();
        let b = store.add_task("b", None).await.unwrap();
        let c = store.add_task("c", None).await.unwrap();
        assert!(a < b && b < c);

        let texts: Vec<String> = store
            .get_all_tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn malformed_document_reads_as_empty() {
        let (kv, store) = web_store(Arc::new(FsImageLoader));
        kv.set(TASKS_KEY, "{not json").await.unwrap();
        store.initialize().await.unwrap();
        assert!(store.get_all_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_is_inlined_before_commit() {
        let (kv, store) = web_store(Arc::new(StaticImageLoader));
        store.initialize().await.unwrap();

        let image = CapturedImage::from_display_path("blob:capture-1");
        let id = store.add_task("photo task", Some(&image)).await.unwrap();

        let task = store.get_task(id).await.unwrap().unwrap();
        let display = task.image_display.unwrap();
        assert!(display.starts_with("data:image/jpeg;base64,"));

        // The inline encoding survives in the stored document itself.
        let raw = kv.get(TASKS_KEY).await.unwrap().unwrap();
        assert!(raw.contains("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn unreachable_image_degrades_to_empty_reference() {
        let (_, store) = web_store(Arc::new(FailingImageLoader));
        store.initialize().await.unwrap();

        let image = CapturedImage::from_display_path("blob:gone");
        let id = store.add_task("still saved", Some(&image)).await.unwrap();

        let task = store.get_task(id).await.unwrap().unwrap();
        assert_eq!(task.text, "still saved");
        assert!(task.image_display.is_none());
        assert!(task.image_filepath.is_none());
    }

    #[tokio::test]
    async fn toggle_completion_is_an_involution() {
        let (_, store) = web_store(Arc::new(FsImageLoader));
        store.initialize().await.unwrap();
        let id = store.add_task("flip me", None).await.unwrap();

        store.toggle_completion(id).await.unwrap();
        assert!(store.get_task(id).await.unwrap().unwrap().completed);

        store.toggle_completion(id).await.unwrap();
        assert!(!store.get_task(id).await.unwrap().unwrap().completed);

        assert!(matches!(
            store.toggle_completion(999).await,
            Err(StoreError::NotFound { id: 999 })
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_, store) = web_store(Arc::new(FsImageLoader));
        store.initialize().await.unwrap();
        let id = store.add_task("to delete", None).await.unwrap();

        store.delete_task(id).await.unwrap();
        assert!(store.get_task(id).await.unwrap().is_none());
        store.delete_task(id).await.unwrap();
    }

    #[tokio::test]
    async fn empty_update_leaves_document_untouched() {
        let (kv, store) = web_store(Arc::new(FsImageLoader));
        store.initialize().await.unwrap();
        let id = store.add_task("unchanged", None).await.unwrap();

        let before = kv.get(TASKS_KEY).await.unwrap().unwrap();
        store.update_task(id, &TaskUpdate::default()).await.unwrap();
        let after = kv.get(TASKS_KEY).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn update_missing_task_is_not_found() {
        let (_, store) = web_store(Arc::new(FsImageLoader));
        store.initialize().await.unwrap();
        let err = store
            .update_task(999, &TaskUpdate::default().with_text("x"))
            .await;
        assert!(matches!(err, Err(StoreError::NotFound { id: 999 })));
    }

    #[tokio::test]
    async fn close_then_reinitialize() {
        let (_, store) = web_store(Arc::new(FsImageLoader));
        store.initialize().await.unwrap();
        store.add_task("kept", None).await.unwrap();

        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(
            store.get_all_tasks().await,
            Err(StoreError::NotInitialized)
        ));

        store.initialize().await.unwrap();
        assert_eq!(store.get_all_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_all_empties_the_store() {
        let (_, store) = web_store(Arc::new(FsImageLoader));
        store.initialize().await.unwrap();
        store.add_task("a", None).await.unwrap();
        store.add_task("b", None).await.unwrap();

        store.clear_all().await.unwrap();
        assert!(store.get_all_tasks().await.unwrap().is_empty());
    }
}
