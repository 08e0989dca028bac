//! Key-value store collaborator used by the web backend.

use std::{collections::HashMap, io, path::PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// A persistent string key-value store.
///
/// Stands in for the browser runtime's persistent key-value storage. The
/// web backend stores its whole task collection under one key here.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Removes the value stored under `key`. Missing keys are a no-op.
    async fn remove(&self, key: &str) -> io::Result<()>;
}

/// Volatile in-memory key-value store for testing.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> io::Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

/// Durable key-value store keeping one file per key under a directory.
#[derive(Debug)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Creates a store rooted at `dir`. The directory is created on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(key), value).await
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
