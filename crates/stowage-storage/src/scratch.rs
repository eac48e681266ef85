//! Scratch namespaces for in-flight work.
//!
//! Two sub-roots live under the scratch root: `chunks/{upload_id}/{index}`
//! for chunk sets awaiting merge, and `staging/{random_id}/...` for archive
//! extraction. Nothing under the scratch root is canonical; the
//! reconciliation scanner may purge all of it.

use crate::error::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const CHUNKS_DIR: &str = "chunks";
const STAGING_DIR: &str = "staging";

#[derive(Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    /// Create a scratch space rooted at `root`, creating the chunk and
    /// staging sub-roots if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(CHUNKS_DIR)).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create chunk scratch dir under {}: {}",
                root.display(),
                e
            ))
        })?;
        fs::create_dir_all(root.join(STAGING_DIR))
            .await
            .map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create staging dir under {}: {}",
                    root.display(),
                    e
                ))
            })?;
        Ok(ScratchSpace { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Upload ids become directory names, so they must be single clean
    /// path segments.
    fn validate_segment(segment: &str) -> StorageResult<()> {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains('/')
            || segment.contains('\\')
            || segment.contains('\0')
        {
            return Err(StorageError::InvalidKey(format!(
                "Invalid scratch path segment: {:?}",
                segment
            )));
        }
        Ok(())
    }

    fn chunk_dir(&self, upload_id: &str) -> StorageResult<PathBuf> {
        Self::validate_segment(upload_id)?;
        Ok(self.root.join(CHUNKS_DIR).join(upload_id))
    }

    /// Path of one chunk file within an upload's chunk set.
    pub fn chunk_path(&self, upload_id: &str, chunk_index: i32) -> StorageResult<PathBuf> {
        Ok(self.chunk_dir(upload_id)?.join(chunk_index.to_string()))
    }

    /// Write one chunk. Writing the same index twice overwrites the
    /// previous bytes.
    pub async fn write_chunk(
        &self,
        upload_id: &str,
        chunk_index: i32,
        data: &[u8],
    ) -> StorageResult<()> {
        let dir = self.chunk_dir(upload_id)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create chunk dir {}: {}",
                dir.display(),
                e
            ))
        })?;

        let path = dir.join(chunk_index.to_string());
        fs::write(&path, data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write chunk {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            upload_id = %upload_id,
            chunk_index = chunk_index,
            size_bytes = data.len(),
            "Chunk written to scratch"
        );

        Ok(())
    }

    /// Number of chunk files currently present for an upload. Zero when the
    /// chunk directory does not exist.
    pub async fn count_chunks(&self, upload_id: &str) -> StorageResult<usize> {
        let dir = self.chunk_dir(upload_id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to read chunk dir {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut count = 0;
        while let Some(_entry) = entries.next_entry().await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to read chunk dir {}: {}", dir.display(), e))
        })? {
            count += 1;
        }
        Ok(count)
    }

    pub async fn read_chunk(&self, upload_id: &str, chunk_index: i32) -> StorageResult<Vec<u8>> {
        let path = self.chunk_path(upload_id, chunk_index)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(
                format!("{}/{}", upload_id, chunk_index),
            )),
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read chunk {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub async fn remove_chunk(&self, upload_id: &str, chunk_index: i32) -> StorageResult<()> {
        let path = self.chunk_path(upload_id, chunk_index)?;
        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!(
                "Failed to remove chunk {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Remove an upload's whole chunk directory. Removing a missing
    /// directory is not an error.
    pub async fn remove_chunk_dir(&self, upload_id: &str) -> StorageResult<()> {
        let dir = self.chunk_dir(upload_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to remove chunk dir {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    /// Path for the merged output of a chunk set. Lives next to the chunk
    /// directory so a failed merge is swept with the rest of the scratch
    /// state.
    pub fn merged_path(&self, upload_id: &str) -> StorageResult<PathBuf> {
        Self::validate_segment(upload_id)?;
        Ok(self
            .root
            .join(CHUNKS_DIR)
            .join(format!("{}.merged", upload_id)))
    }

    /// Create a fresh randomly named staging directory for archive
    /// extraction and return its path.
    pub async fn create_staging(&self) -> StorageResult<PathBuf> {
        let dir = self
            .root
            .join(STAGING_DIR)
            .join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create staging dir {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(dir)
    }

    /// Remove a staging directory and everything in it. Missing is fine.
    pub async fn remove_staging(&self, staging_dir: &Path) -> StorageResult<()> {
        if !staging_dir.starts_with(self.root.join(STAGING_DIR)) {
            return Err(StorageError::InvalidKey(format!(
                "Not a staging directory: {}",
                staging_dir.display()
            )));
        }
        match fs::remove_dir_all(staging_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to remove staging dir {}: {}",
                staging_dir.display(),
                e
            ))),
        }
    }

    /// Names of every entry currently under the chunk and staging roots,
    /// without removing anything.
    pub async fn list_all(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for sub in [CHUNKS_DIR, STAGING_DIR] {
            let dir = self.root.join(sub);
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::ReadFailed(format!(
                        "Failed to read scratch dir {}: {}",
                        dir.display(),
                        e
                    )))
                }
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::ReadFailed(format!(
                    "Failed to read scratch dir {}: {}",
                    dir.display(),
                    e
                ))
            })? {
                names.push(format!("{}/{}", sub, entry.file_name().to_string_lossy()));
            }
        }
        Ok(names)
    }

    /// Purge every chunk set and staging directory. Returns the names of
    /// the directories removed. This deletes in-flight uploads too; callers
    /// own that tradeoff.
    pub async fn purge_all(&self) -> StorageResult<Vec<String>> {
        let mut purged = Vec::new();
        for sub in [CHUNKS_DIR, STAGING_DIR] {
            let dir = self.root.join(sub);
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::ReadFailed(format!(
                        "Failed to read scratch dir {}: {}",
                        dir.display(),
                        e
                    )))
                }
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::ReadFailed(format!(
                    "Failed to read scratch dir {}: {}",
                    dir.display(),
                    e
                ))
            })? {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();
                if entry.file_type().await?.is_dir() {
                    fs::remove_dir_all(&path).await.map_err(|e| {
                        StorageError::DeleteFailed(format!(
                            "Failed to purge {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                } else {
                    fs::remove_file(&path).await.map_err(|e| {
                        StorageError::DeleteFailed(format!(
                            "Failed to purge {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                }
                purged.push(format!("{}/{}", sub, name));
            }
        }

        tracing::info!(purged = purged.len(), "Scratch space purged");

        Ok(purged)
    }
}
