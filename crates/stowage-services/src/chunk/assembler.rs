//! Chunked-upload assembly.
//!
//! Chunks arrive in any order, keyed by upload id and index, and are staged
//! in the scratch namespace. When the chunk set is complete the assembler
//! concatenates it into one blob, exactly once.
//!
//! Submissions for the same upload id are serialized through a per-id lock;
//! different upload ids never contend. The merge itself is additionally
//! guarded by an atomic status transition on the record, so even a
//! competing process cannot merge twice.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use stowage_core::models::{
    FileRecord, FileSource, NewFileRecord, RecordPatch, UploadStatus, Visibility,
};
use stowage_core::AppError;
use stowage_db::FileRepository;
use stowage_storage::{classify, BlobStore, ScratchSpace};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Result of one chunk submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Chunk stored, upload not yet complete.
    Partial { received: usize, expected: i32 },
    /// This submission completed the set and performed the merge.
    Completed(FileRecord),
}

pub struct ChunkAssembler {
    repository: Arc<dyn FileRepository>,
    blob_store: BlobStore,
    scratch: ScratchSpace,
    max_chunk_count: i32,
    // Per-upload-id locks; an entry lives only while submissions for its
    // id are in flight.
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChunkAssembler {
    pub fn new(
        repository: Arc<dyn FileRepository>,
        blob_store: BlobStore,
        scratch: ScratchSpace,
        max_chunk_count: i32,
    ) -> Self {
        Self {
            repository,
            blob_store,
            scratch,
            max_chunk_count,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, upload_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(upload_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry when no other submission holds a handle to it.
    /// A later submission for the same id simply recreates it.
    fn prune_lock(&self, upload_id: &str, handle: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap();
        if let Some(entry) = locks.get(upload_id) {
            // map + our handle are the only references
            if Arc::ptr_eq(entry, handle) && Arc::strong_count(entry) == 2 {
                locks.remove(upload_id);
            }
        }
    }

    /// Number of upload ids currently holding a lock entry.
    pub fn active_upload_locks(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    /// Store one chunk; merge and complete the upload when the set is full.
    #[tracing::instrument(skip(self, bytes), fields(size_bytes = bytes.len()))]
    pub async fn submit_chunk(
        &self,
        upload_id: &str,
        chunk_index: i32,
        expected_total: i32,
        bytes: Bytes,
        owner_id: Option<Uuid>,
        credential_id: Option<Uuid>,
    ) -> Result<SubmitOutcome, AppError> {
        if upload_id.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "Upload id must not be empty".to_string(),
            ));
        }
        if expected_total < 1 || expected_total > self.max_chunk_count {
            return Err(AppError::InvalidRequest(format!(
                "Chunk total must be between 1 and {}, got {}",
                self.max_chunk_count, expected_total
            )));
        }
        if chunk_index < 0 || chunk_index >= expected_total {
            return Err(AppError::InvalidRequest(format!(
                "Chunk index {} out of range for total {}",
                chunk_index, expected_total
            )));
        }

        let lock = self.lock_for(upload_id);
        let result = {
            let _guard = lock.lock().await;
            self.submit_locked(
                upload_id,
                chunk_index,
                expected_total,
                bytes,
                owner_id,
                credential_id,
            )
            .await
        };
        self.prune_lock(upload_id, &lock);
        result
    }

    async fn submit_locked(
        &self,
        upload_id: &str,
        chunk_index: i32,
        expected_total: i32,
        bytes: Bytes,
        owner_id: Option<Uuid>,
        credential_id: Option<Uuid>,
    ) -> Result<SubmitOutcome, AppError> {
        let existing = self.repository.find_by_upload_id(upload_id).await?;

        if let Some(record) = &existing {
            match record.status {
                UploadStatus::Completed | UploadStatus::Failed => {
                    return Err(AppError::Conflict(format!(
                        "Upload {} already finished with status {}",
                        upload_id,
                        record.status.as_str()
                    )));
                }
                _ => {}
            }
            // The total was fixed by the first submission.
            if record.expected_chunk_count != Some(expected_total) {
                return Err(AppError::Conflict(format!(
                    "Chunk total {} does not match the total {} fixed for upload {}",
                    expected_total,
                    record
                        .expected_chunk_count
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "unset".to_string()),
                    upload_id
                )));
            }
        } else {
            // The first submission for an id, whatever its index, creates
            // the record and fixes the chunk total for the whole upload.
            let (mime_type, category) = classify::classify(upload_id);
            self.repository
                .create(NewFileRecord {
                    original_name: upload_id.to_string(),
                    stored_name: upload_id.to_string(),
                    mime_type: mime_type.to_string(),
                    size_bytes: 0,
                    category,
                    storage_path: None,
                    owner_id,
                    credential_id,
                    visibility: Visibility::Private,
                    status: UploadStatus::Uploading,
                    is_chunked: true,
                    expected_chunk_count: Some(expected_total),
                    upload_id: Some(upload_id.to_string()),
                    source: FileSource::Chunked,
                })
                .await?;

            tracing::info!(
                upload_id = %upload_id,
                expected_total = expected_total,
                "Chunked upload started"
            );
        }

        self.scratch
            .write_chunk(upload_id, chunk_index, &bytes)
            .await
            .map_err(|e| AppError::StorageFailure(e.to_string()))?;

        let received = self
            .scratch
            .count_chunks(upload_id)
            .await
            .map_err(|e| AppError::StorageFailure(e.to_string()))?;

        if received < expected_total as usize {
            return Ok(SubmitOutcome::Partial {
                received,
                expected: expected_total,
            });
        }

        // The set looks complete. The claim decides who merges: losers of
        // a completion race see the status already moved on and report
        // partial without touching the chunk files.
        let Some(record) = self.repository.claim_merge(upload_id).await? else {
            return Ok(SubmitOutcome::Partial {
                received,
                expected: expected_total,
            });
        };

        match self.merge(upload_id, expected_total, &record).await {
            Ok(completed) => Ok(SubmitOutcome::Completed(completed)),
            Err(err) => {
                // Remaining chunk files are left in place for repair.
                if let Err(mark_err) = self
                    .repository
                    .update_by_id(
                        record.id,
                        RecordPatch {
                            status: Some(UploadStatus::Failed),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    tracing::error!(
                        upload_id = %upload_id,
                        error = %mark_err,
                        "Failed to mark upload as failed after merge error"
                    );
                }
                Err(err)
            }
        }
    }

    /// Concatenate the chunk set in index order, consuming each chunk file,
    /// then move the result into the blob store and complete the record.
    async fn merge(
        &self,
        upload_id: &str,
        expected_total: i32,
        record: &FileRecord,
    ) -> Result<FileRecord, AppError> {
        let merged_path = self
            .scratch
            .merged_path(upload_id)
            .map_err(|e| AppError::StorageFailure(e.to_string()))?;

        let mut output = tokio::fs::File::create(&merged_path)
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to open merge output: {}", e)))?;

        let mut size_bytes: i64 = 0;
        for index in 0..expected_total {
            let chunk = self
                .scratch
                .read_chunk(upload_id, index)
                .await
                .map_err(|e| {
                    AppError::StorageFailure(format!(
                        "Failed to read chunk {} of upload {}: {}",
                        index, upload_id, e
                    ))
                })?;
            output.write_all(&chunk).await.map_err(|e| {
                AppError::StorageFailure(format!("Failed to append chunk {}: {}", index, e))
            })?;
            size_bytes += chunk.len() as i64;

            self.scratch
                .remove_chunk(upload_id, index)
                .await
                .map_err(|e| AppError::StorageFailure(e.to_string()))?;
        }
        output
            .sync_all()
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to sync merge output: {}", e)))?;
        drop(output);

        self.scratch
            .remove_chunk_dir(upload_id)
            .await
            .map_err(|e| AppError::StorageFailure(e.to_string()))?;

        let storage_path = self
            .blob_store
            .move_in(&merged_path, record.category, &record.stored_name)
            .await
            .map_err(|e| AppError::StorageFailure(e.to_string()))?;

        let completed = self
            .repository
            .update_by_id(
                record.id,
                RecordPatch {
                    status: Some(UploadStatus::Completed),
                    storage_path: Some(Some(storage_path.clone())),
                    size_bytes: Some(size_bytes),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            upload_id = %upload_id,
            storage_path = %storage_path,
            size_bytes = size_bytes,
            "Chunked upload merged"
        );

        Ok(completed)
    }
}
