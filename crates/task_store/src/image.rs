//! Image loading and inline encoding for the web backend.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{StoreError, StoreResult};

/// Loads raw image bytes from a capture-time reference.
///
/// Stands in for fetching the camera capture so the web backend can embed
/// the bytes in its stored document.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Fetches the bytes behind an image reference.
    async fn load(&self, reference: &str) -> StoreResult<Vec<u8>>;
}

/// Loader that treats references as local filesystem paths.
#[derive(Debug, Default)]
pub struct FsImageLoader;

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, reference: &str) -> StoreResult<Vec<u8>> {
        tokio::fs::read(reference)
            .await
            .map_err(|e| StoreError::image_conversion(format!("{reference}: {e}")))
    }
}

/// Encodes image bytes as a self-contained `data:` URI.
///
/// Camera captures are JPEG.
pub fn inline_data_uri(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}
