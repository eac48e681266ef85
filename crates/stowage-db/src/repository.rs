//! Repository trait for the metadata index.

use async_trait::async_trait;
use stowage_core::models::{FileRecord, NewFileRecord, RecordFilter, RecordPatch};
use stowage_core::AppError;
use uuid::Uuid;

/// File metadata repository.
///
/// The blob store never reaches through this trait; callers coordinate
/// the two explicitly so reconciliation has something to reconcile.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<FileRecord>, AppError>;

    async fn find(&self, filter: &RecordFilter) -> Result<Vec<FileRecord>, AppError>;

    /// Apply a partial update. Errors with `NotFound` when the id does not
    /// exist; an empty patch still bumps `updated_at`.
    async fn update_by_id(&self, id: Uuid, patch: RecordPatch) -> Result<FileRecord, AppError>;

    /// Hard-delete a record. Returns whether a row was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError>;

    /// Atomically move an upload's record from `uploading` to `merging`.
    ///
    /// Exactly one caller per upload id observes `Some`; everyone else gets
    /// `None`, including when the record does not exist or already moved on.
    async fn claim_merge(&self, upload_id: &str) -> Result<Option<FileRecord>, AppError>;
}
