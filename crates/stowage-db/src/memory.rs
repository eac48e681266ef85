//! In-memory file repository for tests.
//!
//! Mirrors the Postgres implementation's semantics, including the
//! compare-and-swap in `claim_merge`, without needing a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use stowage_core::models::{FileRecord, NewFileRecord, RecordFilter, RecordPatch, UploadStatus};
use stowage_core::AppError;
use uuid::Uuid;

use crate::repository::FileRepository;

#[derive(Default)]
pub struct InMemoryFileRepository {
    records: Mutex<HashMap<Uuid, FileRecord>>,
}

impl InMemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let mut records = self.records.lock().unwrap();

        if let Some(upload_id) = &record.upload_id {
            if records
                .values()
                .any(|r| r.upload_id.as_deref() == Some(upload_id.as_str()))
            {
                return Err(AppError::Database(format!(
                    "duplicate key value violates unique constraint: upload_id {}",
                    upload_id
                )));
            }
        }
        if records
            .values()
            .any(|r| r.stored_name == record.stored_name)
        {
            return Err(AppError::Database(format!(
                "duplicate key value violates unique constraint: stored_name {}",
                record.stored_name
            )));
        }

        let now = Utc::now();
        let created = FileRecord {
            id: Uuid::new_v4(),
            original_name: record.original_name,
            stored_name: record.stored_name,
            mime_type: record.mime_type,
            size_bytes: record.size_bytes,
            category: record.category,
            storage_path: record.storage_path,
            owner_id: record.owner_id,
            credential_id: record.credential_id,
            visibility: record.visibility,
            status: record.status,
            is_chunked: record.is_chunked,
            expected_chunk_count: record.expected_chunk_count,
            upload_id: record.upload_id,
            source: record.source,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        records.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<FileRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.upload_id.as_deref() == Some(upload_id))
            .cloned())
    }

    async fn find(&self, filter: &RecordFilter) -> Result<Vec<FileRecord>, AppError> {
        let records = self.records.lock().unwrap();
        let mut matched: Vec<FileRecord> = records
            .values()
            .filter(|r| {
                filter
                    .upload_id
                    .as_ref()
                    .is_none_or(|u| r.upload_id.as_deref() == Some(u.as_str()))
                    && filter.status.is_none_or(|s| r.status == s)
                    && filter.source.is_none_or(|s| r.source == s)
                    && (!filter.live_only || r.is_live())
            })
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.created_at);
        Ok(matched)
    }

    async fn update_by_id(&self, id: Uuid, patch: RecordPatch) -> Result<FileRecord, AppError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;

        if let Some(stored_name) = patch.stored_name {
            record.stored_name = stored_name;
        }
        if let Some(mime_type) = patch.mime_type {
            record.mime_type = mime_type;
        }
        if let Some(size_bytes) = patch.size_bytes {
            record.size_bytes = size_bytes;
        }
        if let Some(category) = patch.category {
            record.category = category;
        }
        if let Some(storage_path) = patch.storage_path {
            record.storage_path = storage_path;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(deleted_at) = patch.deleted_at {
            record.deleted_at = deleted_at;
        }
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.records.lock().unwrap().remove(&id).is_some())
    }

    async fn claim_merge(&self, upload_id: &str) -> Result<Option<FileRecord>, AppError> {
        let mut records = self.records.lock().unwrap();
        for record in records.values_mut() {
            if record.upload_id.as_deref() == Some(upload_id)
                && record.status == UploadStatus::Uploading
            {
                record.status = UploadStatus::Merging;
                record.updated_at = Utc::now();
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }
}
