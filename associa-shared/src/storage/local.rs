/// Filesystem artifact store
///
/// Keys map to paths below the base directory. Writes go to a `.tmp` sibling
/// that is synced and renamed into place, so readers never observe a partial
/// artifact.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{validate_key, ArtifactReader, ArtifactStore, StorageError};

#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    base_path: PathBuf,
    max_size_bytes: usize,
}

impl LocalArtifactStore {
    pub fn new(base_path: impl Into<PathBuf>, max_size_bytes: usize) -> Self {
        Self {
            base_path: base_path.into(),
            max_size_bytes,
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, key: &str, content: Bytes) -> Result<(), StorageError> {
        if content.len() > self.max_size_bytes {
            return Err(StorageError::TooLarge {
                size: content.len(),
                max: self.max_size_bytes,
            });
        }

        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp = path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let mut file = fs::File::create(&temp).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, &path).await?;

        tracing::debug!(key, size = content.len(), "artifact stored");
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<ArtifactReader, StorageError> {
        let path = self.path_for(key)?;

        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key, "artifact deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn store(dir: &TempDir) -> LocalArtifactStore {
        LocalArtifactStore::new(dir.path(), 1024)
    }

    #[tokio::test]
    async fn test_put_and_open() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .put("certificates/m1/c1.html", Bytes::from_static(b"<html></html>"))
            .await
            .unwrap();

        let mut reader = store.open("certificates/m1/c1.html").await.unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();

        assert_eq!(content, "<html></html>");
        assert!(store.exists("certificates/m1/c1.html").await.unwrap());
        assert!(!dir.path().join("certificates/m1/c1.html.tmp").exists());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.put("ebooks/a.pdf", Bytes::from_static(b"v1")).await.unwrap();
        store.put("ebooks/a.pdf", Bytes::from_static(b"v2")).await.unwrap();

        let mut reader = store.open("ebooks/a.pdf").await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"v2");
    }

    #[tokio::test]
    async fn test_open_missing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(matches!(
            store.open("ebooks/missing.pdf").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!store.exists("ebooks/missing.pdf").await.unwrap());
        assert!(!store.delete("ebooks/missing.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.put("ebooks/a.pdf", Bytes::from_static(b"v1")).await.unwrap();
        assert!(store.delete("ebooks/a.pdf").await.unwrap());

        assert!(!dir.path().join("ebooks/a.pdf").exists());
        assert!(matches!(
            store.open("ebooks/a.pdf").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_oversize() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(matches!(
            store.put("../escape", Bytes::from_static(b"x")).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("big.bin", Bytes::from(vec![0u8; 2048])).await,
            Err(StorageError::TooLarge { size: 2048, max: 1024 })
        ));
    }
}
