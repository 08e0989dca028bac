//! Task store error types.

use thiserror::Error;

/// Errors that can occur during task store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage medium could not be opened or reached.
    ///
    /// Fatal for the session; callers must not proceed to other operations.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    /// An operation was invoked before `initialize()` succeeded or after
    /// `close()`. Recoverable by re-initializing.
    #[error("store is not initialized")]
    NotInitialized,

    /// The targeted task does not exist.
    #[error("task not found: {id}")]
    NotFound { id: i64 },

    /// Stored data could not be decoded.
    ///
    /// The web backend absorbs this locally by treating the collection as
    /// empty; it never propagates from a read.
    #[error("malformed stored data: {0}")]
    MalformedData(#[source] serde_json::Error),

    /// Inline-encoding an attached image failed.
    ///
    /// Absorbed locally: the task is saved with an empty image reference.
    #[error("image conversion failed: {reason}")]
    ImageConversionFailed { reason: String },

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error on the write path.
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Key-value store error.
    #[error("key-value store error: {0}")]
    KeyValue(#[from] std::io::Error),
}

impl StoreError {
    /// Creates a storage-unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates an image-conversion error.
    pub fn image_conversion(reason: impl Into<String>) -> Self {
        Self::ImageConversionFailed {
            reason: reason.into(),
        }
    }
}

/// Result type for task store operations.
pub type StoreResult<T> = Result<T, StoreError>;
