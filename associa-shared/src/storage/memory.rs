/// In-memory artifact store

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Cursor;
use tokio::sync::RwLock;

use super::{validate_key, ArtifactReader, ArtifactStore, StorageError};

#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, key: &str, content: Bytes) -> Result<(), StorageError> {
        validate_key(key)?;
        self.artifacts.write().await.insert(key.to_string(), content);
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<ArtifactReader, StorageError> {
        validate_key(key)?;
        let artifacts = self.artifacts.read().await;
        let content = artifacts
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        Ok(Box::new(Cursor::new(content)))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.artifacts.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.artifacts.write().await.remove(key).is_some())
    }
}
