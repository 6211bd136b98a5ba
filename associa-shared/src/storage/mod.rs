/// Artifact storage
///
/// Binary artifacts (certificate documents, e-book files) are kept outside the
/// database and addressed by a relative key such as
/// `certificates/<member>/<id>.html`. Readers are streamed back to the client.
///
/// # Adapters
///
/// - [`local::LocalArtifactStore`]: files under a base directory
/// - [`memory::InMemoryArtifactStore`]: process memory, for tests

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;

pub mod local;
pub mod memory;

pub use local::LocalArtifactStore;
pub use memory::InMemoryArtifactStore;

/// Boxed reader over a stored artifact
pub type ArtifactReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("Artifact too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `content` under `key`, replacing any previous artifact
    async fn put(&self, key: &str, content: Bytes) -> Result<(), StorageError>;

    /// Opens an artifact for streaming
    async fn open(&self, key: &str) -> Result<ArtifactReader, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Removes an artifact; returns false when there was nothing to remove
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Deletes an artifact that is no longer referenced, logging failures
pub async fn discard(store: &dyn ArtifactStore, key: &str) {
    match store.delete(key).await {
        Ok(true) => tracing::debug!(key, "artifact discarded"),
        Ok(false) => {}
        Err(e) => tracing::warn!(key, error = %e, "failed to discard artifact"),
    }
}

/// Rejects empty, absolute and parent-relative keys
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}
