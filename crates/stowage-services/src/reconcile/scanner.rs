//! Reconciliation between the blob store and the metadata index.
//!
//! Orphan files (bytes with no record) are deleted from disk; orphan
//! records (records whose storage path is gone) are deleted from the index;
//! the scratch namespaces are purged in full.
//!
//! The scratch purge assumes no upload or ingestion is in flight. Run this
//! in a maintenance window or accept that an in-progress chunk set will be
//! destroyed.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use stowage_core::models::RecordFilter;
use stowage_core::AppError;
use stowage_db::FileRepository;
use stowage_storage::{BlobStore, ScratchSpace};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub dry_run: bool,
    /// Storage keys on disk with no record referencing them.
    pub orphan_files: Vec<String>,
    /// Record ids whose storage path no longer exists on disk.
    pub orphan_records: Vec<Uuid>,
    /// Scratch entries purged (or that would be, on a dry run).
    pub purged_scratch_dirs: Vec<String>,
}

pub struct ReconciliationScanner {
    repository: Arc<dyn FileRepository>,
    blob_store: BlobStore,
    scratch: ScratchSpace,
}

impl ReconciliationScanner {
    pub fn new(
        repository: Arc<dyn FileRepository>,
        blob_store: BlobStore,
        scratch: ScratchSpace,
    ) -> Self {
        Self {
            repository,
            blob_store,
            scratch,
        }
    }

    /// Compare the blob store against the metadata index and repair drift.
    ///
    /// Individual orphans never fail the run; only inability to read the
    /// blob store root or the index is fatal.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, dry_run: bool) -> Result<ReconcileReport, AppError> {
        let keys = self
            .blob_store
            .list_keys()
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to list blob store: {}", e)))?;

        // Soft-deleted records still own their bytes; the filter must not
        // exclude them.
        let records = self.repository.find(&RecordFilter::all()).await?;

        let referenced: HashSet<&str> = records
            .iter()
            .filter_map(|r| r.storage_path.as_deref())
            .collect();
        let on_disk: HashSet<&str> = keys.iter().map(String::as_str).collect();

        let mut orphan_files = Vec::new();
        for key in &keys {
            if referenced.contains(key.as_str()) {
                continue;
            }
            if !dry_run {
                if let Err(e) = self.blob_store.delete(key).await {
                    tracing::warn!(key = %key, error = %e, "Failed to delete orphan file");
                    continue;
                }
            }
            orphan_files.push(key.clone());
        }

        let mut orphan_records = Vec::new();
        for record in &records {
            let Some(path) = record.storage_path.as_deref() else {
                continue;
            };
            if on_disk.contains(path) {
                continue;
            }
            if !dry_run {
                if let Err(e) = self.repository.delete_by_id(record.id).await {
                    tracing::warn!(record_id = %record.id, error = %e, "Failed to delete orphan record");
                    continue;
                }
            }
            orphan_records.push(record.id);
        }

        let purged_scratch_dirs = if dry_run {
            self.scratch
                .list_all()
                .await
                .map_err(|e| AppError::StorageFailure(e.to_string()))?
        } else {
            self.scratch
                .purge_all()
                .await
                .map_err(|e| AppError::StorageFailure(e.to_string()))?
        };

        tracing::info!(
            dry_run = dry_run,
            orphan_files = orphan_files.len(),
            orphan_records = orphan_records.len(),
            purged_scratch_dirs = purged_scratch_dirs.len(),
            "Reconciliation completed"
        );

        Ok(ReconcileReport {
            dry_run,
            orphan_files,
            orphan_records,
            purged_scratch_dirs,
        })
    }
}
