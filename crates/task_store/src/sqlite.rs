//! Native backend: one embedded SQLite database file.
//!
//! One pool of a single connection per database path per process; the
//! engine serializes statements on that connection. Image attachments are
//! stored as filesystem paths, never as bytes.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex as StdMutex, OnceLock},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{CapturedImage, Task};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{StoreError, StoreResult, TaskStore, TaskUpdate};

/// SQL schema, applied idempotently at initialization.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    image_filepath TEXT,
    image_webview_path TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

const SELECT_COLUMNS: &str = "id, text, image_filepath, image_webview_path, completed, created_at";

/// Open pools by database path.
///
/// A session that ended without `close()` leaves its pool registered here;
/// initialization must force-close it before opening a fresh connection,
/// since two live connections to the same store must not coexist.
fn connections() -> &'static StdMutex<HashMap<PathBuf, Pool<Sqlite>>> {
    static CONNECTIONS: OnceLock<StdMutex<HashMap<PathBuf, Pool<Sqlite>>>> = OnceLock::new();
    CONNECTIONS.get_or_init(|| StdMutex::new(HashMap::new()))
}

/// Row layout of the `tasks` table.
#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    text: String,
    image_filepath: Option<String>,
    image_webview_path: Option<String>,
    completed: bool,
    created_at: DateTime<Utc>,
}

impl TaskRow {
    /// The webview path derived from the stored file path is what display
    /// surfaces render; deriving it is the capture collaborator's concern.
    fn into_task(self) -> Task {
        Task {
            id: self.id,
            text: self.text,
            image_filepath: self.image_filepath,
            image_display: self.image_webview_path,
            completed: self.completed,
            created_at: self.created_at,
        }
    }
}

/// Task store backed by an embedded SQLite database.
pub struct SqliteTaskStore {
    db_path: PathBuf,
    pool: RwLock<Option<Pool<Sqlite>>>,
}

impl SqliteTaskStore {
    /// Creates a store for the database file at `db_path`. Nothing is
    /// opened until `initialize`.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            pool: RwLock::new(None),
        }
    }

    /// Creates a store on an in-memory database. Used by tests.
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    async fn pool(&self) -> StoreResult<Pool<Sqlite>> {
        (*self.pool.read().await)
            .clone()
            .ok_or(StoreError::NotInitialized)
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn initialize(&self) -> StoreResult<()> {
        let mut slot = self.pool.write().await;
        if slot.is_some() {
            // Already open; repeated initialization must not disturb data.
            return Ok(());
        }

        let in_memory = self.db_path == Path::new(":memory:");

        // Reconcile a prior ungracefully terminated session: a stale pool
        // registered for this path is closed before a fresh open. Taken out
        // of the registry first so the lock is not held across the await.
        // In-memory stores are private to their pool and never registered.
        if !in_memory {
            let stale = {
                let mut registry = connections().lock().unwrap();
                registry.remove(&self.db_path)
            };
            if let Some(stale) = stale {
                warn!(
                    "closing stale connection for {} before reopening",
                    self.db_path.display()
                );
                stale.close().await;
            }
        }

        let db_url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            if let Some(parent) = self.db_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            format!("sqlite:{}?mode=rwc", self.db_path.display())
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;

        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;

        if !in_memory {
            connections()
                .lock()
                .unwrap()
                .insert(self.db_path.clone(), pool.clone());
        }
        *slot = Some(pool);
        info!("sqlite task store ready at {}", self.db_path.display());
        Ok(())
    }

    async fn add_task(&self, text: &str, image: Option<&CapturedImage>) -> StoreResult<i64> {
        let pool = self.pool().await?;
        let file_path = image.and_then(|i| i.file_path.as_deref());
        let webview_path = image.and_then(|i| i.display_path.as_deref());

        let result = sqlx::query(
            "INSERT INTO tasks (text, image_filepath, image_webview_path) VALUES (?, ?, ?)",
        )
        .bind(text)
        .bind(file_path)
        .bind(webview_path)
        .execute(&pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get_all_tasks(&self) -> StoreResult<Vec<Task>> {
        let pool = self.pool().await?;
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&pool)
        .await?;

        Ok(rows.into_iter().map(TaskRow::into_task).collect())
    }

    async fn get_task(&self, id: i64) -> StoreResult<Option<Task>> {
        let pool = self.pool().await?;
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?"))
                .bind(id)
                .fetch_optional(&pool)
                .await?;

        Ok(row.map(TaskRow::into_task))
    }

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> StoreResult<()> {
        let pool = self.pool().await?;
        if update.is_empty() {
            // Zero statements for an empty update set.
            return Ok(());
        }

        // Column list built from only the supplied fields; values always
        // travel as bind parameters.
        let mut columns = Vec::new();
        if update.text.is_some() {
            columns.push("text = ?");
        }
        if update.image.is_some() {
            columns.push("image_filepath = ?");
            columns.push("image_webview_path = ?");
        }
        if update.completed.is_some() {
            columns.push("completed = ?");
        }

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", columns.join(", "));
        let mut query = sqlx::query(&sql);
        if let Some(text) = &update.text {
            query = query.bind(text);
        }
        if let Some(image) = &update.image {
            query = query.bind(&image.file_path).bind(&image.display_path);
        }
        if let Some(completed) = update.completed {
            query = query.bind(completed);
        }
        let result = query.bind(id).execute(&pool).await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    async fn toggle_completion(&self, id: i64) -> StoreResult<()> {
        let pool = self.pool().await?;
        let result = sqlx::query("UPDATE tasks SET completed = 1 - completed WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    async fn delete_task(&self, id: i64) -> StoreResult<()> {
        let pool = self.pool().await?;
        // Missing ids fall through as a successful no-op.
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn clear_all(&self) -> StoreResult<()> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM tasks").execute(&pool).await?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        let mut slot = self.pool.write().await;
        if let Some(pool) = slot.take() {
            {
                let mut registry = connections().lock().unwrap();
                registry.remove(&self.db_path);
            }
            pool.close().await;
            info!("sqlite task store closed for {}", self.db_path.display());
        }
        Ok(())
    }
}
