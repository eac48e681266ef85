//! Canonical blob store: a hierarchical filesystem namespace partitioned
//! by content category. Pure storage primitive: put, move, delete, exists,
//! list. All metadata lives elsewhere.

use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use stowage_core::models::Category;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem blob store
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a new BlobStore rooted at `root`, creating the root and all
    /// category partitions if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create blob root {}: {}",
                root.display(),
                e
            ))
        })?;
        for category in Category::ALL {
            fs::create_dir_all(root.join(category.as_str()))
                .await
                .map_err(|e| {
                    StorageError::ConfigError(format!(
                        "Failed to create partition {}: {}",
                        category, e
                    ))
                })?;
        }

        Ok(BlobStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the storage key for a category and stored name.
    pub fn key_for(category: Category, stored_name: &str) -> String {
        format!("{}/{}", category.as_str(), stored_name)
    }

    /// Convert a storage key to a filesystem path, rejecting keys that
    /// could escape the blob root.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty()
            || storage_key.contains("..")
            || storage_key.starts_with('/')
            || storage_key.contains('\\')
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(self.root.join(storage_key))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes into a category partition. Returns the storage key.
    pub async fn put(
        &self,
        category: Category,
        stored_name: &str,
        data: &[u8],
    ) -> StorageResult<String> {
        let key = Self::key_for(category, stored_name);
        let path = self.key_to_path(&key)?;

        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            key = %key,
            size_bytes = data.len(),
            "Blob store put successful"
        );

        Ok(key)
    }

    /// Move an existing file (e.g. a staged archive entry) into a category
    /// partition. Falls back to copy+remove when rename crosses devices.
    /// Returns the storage key.
    pub async fn move_in(
        &self,
        from: &Path,
        category: Category,
        stored_name: &str,
    ) -> StorageResult<String> {
        let key = Self::key_for(category, stored_name);
        let to = self.key_to_path(&key)?;

        self.ensure_parent_dir(&to).await?;

        match fs::rename(from, &to).await {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc_exdev()) => {
                fs::copy(from, &to).await.map_err(|e| {
                    StorageError::WriteFailed(format!(
                        "Failed to copy {} to {}: {}",
                        from.display(),
                        to.display(),
                        e
                    ))
                })?;
                fs::remove_file(from).await.map_err(|e| {
                    StorageError::DeleteFailed(format!(
                        "Failed to remove source {}: {}",
                        from.display(),
                        e
                    ))
                })?;
            }
            Err(e) => {
                return Err(StorageError::WriteFailed(format!(
                    "Failed to move {} to {}: {}",
                    from.display(),
                    to.display(),
                    e
                )));
            }
        }

        tracing::debug!(from = %from.display(), key = %key, "Blob store move successful");

        Ok(key)
    }

    /// Read a whole object by its storage key.
    pub async fn read(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    /// Read an object as a stream of chunks (for large downloads).
    pub async fn read_stream(
        &self,
        storage_key: &str,
    ) -> StorageResult<Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let reader = tokio_util::io::ReaderStream::new(file);
        let stream = reader.map(|result| {
            result.map_err(|e| StorageError::ReadFailed(format!("Failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }

    /// Delete an object. Deleting a missing key is not an error.
    pub async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::debug!(key = %storage_key, "Blob store delete successful");

        Ok(())
    }

    pub async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    pub async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
        Ok(meta.len())
    }

    /// List every regular file under the blob root as a storage key.
    ///
    /// The walk is iterative (explicit stack), so nesting depth cannot
    /// overflow the call stack.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                StorageError::ReadFailed(format!(
                    "Failed to read directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::ReadFailed(format!(
                    "Failed to read directory entry in {}: {}",
                    dir.display(),
                    e
                ))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(rel) = path.strip_prefix(&self.root) {
                        // Keys always use forward slashes.
                        let key = rel
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        keys.push(key);
                    }
                }
            }
        }

        Ok(keys)
    }
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    18 // EXDEV: cross-device link
}

#[cfg(not(unix))]
fn libc_exdev() -> i32 {
    17 // ERROR_NOT_SAME_DEVICE maps differently; rename fallback still applies
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path()).await.unwrap();

        let key = store
            .put(Category::Others, "blob.bin", b"payload")
            .await
            .unwrap();
        assert_eq!(key, "others/blob.bin");

        let data = store.read(&key).await.unwrap();
        assert_eq!(data, b"payload");
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.content_length(&key).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_partitions_created() {
        let dir = tempdir().unwrap();
        let _store = BlobStore::new(dir.path()).await.unwrap();

        for category in Category::ALL {
            assert!(dir.path().join(category.as_str()).is_dir());
        }
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path()).await.unwrap();

        let result = store.read("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = store.delete("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path()).await.unwrap();

        assert!(store.delete("others/nope.bin").await.is_ok());
    }

    #[tokio::test]
    async fn test_move_in() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path()).await.unwrap();

        let src_dir = tempdir().unwrap();
        let src = src_dir.path().join("staged.txt");
        tokio::fs::write(&src, b"staged content").await.unwrap();

        let key = store
            .move_in(&src, Category::Docs, "staged.txt")
            .await
            .unwrap();
        assert_eq!(key, "docs/staged.txt");
        assert!(!src.exists());
        assert_eq!(store.read(&key).await.unwrap(), b"staged content");
    }

    #[tokio::test]
    async fn test_list_keys_walks_nested_dirs() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path()).await.unwrap();

        store.put(Category::Images, "a.webp", b"a").await.unwrap();
        store.put(Category::Others, "b.bin", b"b").await.unwrap();
        // Nested path inside a partition
        tokio::fs::create_dir_all(dir.path().join("others/deep/deeper"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("others/deep/deeper/c.bin"), b"c")
            .await
            .unwrap();

        let mut keys = store.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec!["images/a.webp", "others/b.bin", "others/deep/deeper/c.bin"]
        );
    }
}
