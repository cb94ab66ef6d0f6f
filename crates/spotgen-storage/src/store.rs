//! The asset store abstraction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};

/// Content-addressable-by-key blob storage with presigned read URLs.
///
/// Keys are deterministic (see `spotgen_models::keys`), and writes must
/// be idempotent: uploading identical bytes to the same key twice
/// yields a URL resolving to identical content both times.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload a local file, returning a retrievable URL.
    async fn put(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<String>;

    /// Upload raw bytes, returning a retrievable URL.
    async fn put_bytes(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> StorageResult<String>;

    /// Generate a time-limited read URL for an existing object.
    async fn presigned_get(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    /// Download an object to a local file.
    async fn download(&self, key: &str, path: &Path) -> StorageResult<()>;

    /// Whether an object exists at the key.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// In-memory asset store for tests.
///
/// URLs take the form `memory://{key}` so tests can assert on the key
/// an artifact landed under.
#[derive(Clone, Default)]
pub struct MemoryAssetStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes stored at a key, if any.
    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn put(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<String> {
        let data = tokio::fs::read(path).await?;
        self.put_bytes(key, data, content_type).await
    }

    async fn put_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.objects.write().await.insert(key.to_string(), data);
        Ok(format!("memory://{}", key))
    }

    async fn presigned_get(&self, key: &str, _ttl: Duration) -> StorageResult<String> {
        if !self.objects.read().await.contains_key(key) {
            return Err(StorageError::not_found(key));
        }
        Ok(format!("memory://{}", key))
    }

    async fn download(&self, key: &str, path: &Path) -> StorageResult<()> {
        let data = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryAssetStore::new();
        let url = store
            .put_bytes("users/u/jobs/j/final/video.mp4", b"abc".to_vec(), "video/mp4")
            .await
            .unwrap();
        assert_eq!(url, "memory://users/u/jobs/j/final/video.mp4");
        assert!(store.exists("users/u/jobs/j/final/video.mp4").await.unwrap());
        assert_eq!(
            store.get_bytes("users/u/jobs/j/final/video.mp4").await,
            Some(b"abc".to_vec())
        );
    }

    #[tokio::test]
    async fn test_idempotent_writes() {
        let store = MemoryAssetStore::new();
        let url1 = store
            .put_bytes("k", b"same".to_vec(), "video/mp4")
            .await
            .unwrap();
        let url2 = store
            .put_bytes("k", b"same".to_vec(), "video/mp4")
            .await
            .unwrap();
        assert_eq!(url1, url2);
        assert_eq!(store.get_bytes("k").await, Some(b"same".to_vec()));
    }

    #[tokio::test]
    async fn test_presign_missing_key() {
        let store = MemoryAssetStore::new();
        let err = store
            .presigned_get("nope", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryAssetStore::new();
        store.delete("nope").await.unwrap();
    }
}
