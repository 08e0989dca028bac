//! Task entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single to-do item with an optional photo attachment.
///
/// The `image_display` field is always directly renderable: the storage
/// layer resolves it to either an inline `data:` URI or a webview URI
/// before handing the task to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned by the storage backend.
    pub id: i64,
    /// Task description.
    pub text: String,
    /// Durable filesystem path of the attached photo, if any.
    #[serde(default)]
    pub image_filepath: Option<String>,
    /// Display-ready image reference, if any.
    #[serde(default)]
    pub image_display: Option<String>,
    /// Completion state.
    #[serde(default)]
    pub completed: bool,
    /// Creation timestamp, assigned by the storage backend.
    pub created_at: DateTime<Utc>,
}

/// An image handle produced by the camera capture step.
///
/// The capture collaborator yields a transient display path on every
/// platform and, on native devices, a durable file path written by the
/// photo-storage collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapturedImage {
    /// Durable filesystem path (native platforms only).
    #[serde(default)]
    pub file_path: Option<String>,
    /// Transient capture-time display path. Not guaranteed to survive a
    /// process restart.
    #[serde(default)]
    pub display_path: Option<String>,
}

impl CapturedImage {
    /// Creates a capture handle with only a transient display path.
    pub fn from_display_path(display_path: impl Into<String>) -> Self {
        Self {
            file_path: None,
            display_path: Some(display_path.into()),
        }
    }

    /// Creates a capture handle with a durable file path and its
    /// capture-time display path.
    pub fn from_file(file_path: impl Into<String>, display_path: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            display_path: Some(display_path.into()),
        }
    }

    /// Returns the reference to load image bytes from, preferring the
    /// transient display path over the durable file path.
    pub fn load_reference(&self) -> Option<&str> {
        self.display_path.as_deref().or(self.file_path.as_deref())
    }
}
