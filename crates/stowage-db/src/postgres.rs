//! Postgres-backed file repository.
//!
//! Enum fields are stored as text and parsed on the way out; a row with an
//! unrecognized value is a deployment bug and surfaces as `Internal`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use stowage_core::models::{
    Category, FileRecord, FileSource, NewFileRecord, RecordFilter, RecordPatch, UploadStatus,
    Visibility,
};
use stowage_core::AppError;
use uuid::Uuid;

use crate::repository::FileRepository;

const COLUMNS: &str = "id, original_name, stored_name, mime_type, size_bytes, category, \
     storage_path, owner_id, credential_id, visibility, status, is_chunked, \
     expected_chunk_count, upload_id, source, deleted_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: Uuid,
    original_name: String,
    stored_name: String,
    mime_type: String,
    size_bytes: i64,
    category: String,
    storage_path: Option<String>,
    owner_id: Option<Uuid>,
    credential_id: Option<Uuid>,
    visibility: String,
    status: String,
    is_chunked: bool,
    expected_chunk_count: Option<i32>,
    upload_id: Option<String>,
    source: String,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = AppError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let category = Category::parse(&row.category)
            .ok_or_else(|| AppError::Internal(format!("Unknown category: {}", row.category)))?;
        let visibility = Visibility::parse(&row.visibility)
            .ok_or_else(|| AppError::Internal(format!("Unknown visibility: {}", row.visibility)))?;
        let status = UploadStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown status: {}", row.status)))?;
        let source = FileSource::parse(&row.source)
            .ok_or_else(|| AppError::Internal(format!("Unknown source: {}", row.source)))?;

        Ok(FileRecord {
            id: row.id,
            original_name: row.original_name,
            stored_name: row.stored_name,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            category,
            storage_path: row.storage_path,
            owner_id: row.owner_id,
            credential_id: row.credential_id,
            visibility,
            status,
            is_chunked: row.is_chunked,
            expected_chunk_count: row.expected_chunk_count,
            upload_id: row.upload_id,
            source,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn db_err(err: sqlx::Error) -> AppError {
    AppError::Database(err.to_string())
}

#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.operation = "insert"))]
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            INSERT INTO files (
                original_name, stored_name, mime_type, size_bytes, category,
                storage_path, owner_id, credential_id, visibility, status,
                is_chunked, expected_chunk_count, upload_id, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&record.original_name)
        .bind(&record.stored_name)
        .bind(&record.mime_type)
        .bind(record.size_bytes)
        .bind(record.category.as_str())
        .bind(&record.storage_path)
        .bind(record.owner_id)
        .bind(record.credential_id)
        .bind(record.visibility.as_str())
        .bind(record.status.as_str())
        .bind(record.is_chunked)
        .bind(record.expected_chunk_count)
        .bind(&record.upload_id)
        .bind(record.source.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {COLUMNS} FROM files WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(FileRecord::try_from).transpose()
    }

    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {COLUMNS} FROM files WHERE upload_id = $1"
        ))
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(FileRecord::try_from).transpose()
    }

    #[tracing::instrument(skip(self, filter), fields(db.table = "files", db.operation = "select"))]
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<FileRecord>, AppError> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM files WHERE 1 = 1"));

        if let Some(upload_id) = &filter.upload_id {
            qb.push(" AND upload_id = ");
            qb.push_bind(upload_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(source) = filter.source {
            qb.push(" AND source = ");
            qb.push_bind(source.as_str());
        }
        if filter.live_only {
            qb.push(" AND deleted_at IS NULL");
        }
        qb.push(" ORDER BY created_at ASC");

        let rows: Vec<FileRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(FileRecord::try_from).collect()
    }

    #[tracing::instrument(skip(self, patch), fields(db.table = "files", db.operation = "update"))]
    async fn update_by_id(&self, id: Uuid, patch: RecordPatch) -> Result<FileRecord, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE files SET updated_at = NOW()");

        if let Some(stored_name) = patch.stored_name {
            qb.push(", stored_name = ");
            qb.push_bind(stored_name);
        }
        if let Some(mime_type) = patch.mime_type {
            qb.push(", mime_type = ");
            qb.push_bind(mime_type);
        }
        if let Some(size_bytes) = patch.size_bytes {
            qb.push(", size_bytes = ");
            qb.push_bind(size_bytes);
        }
        if let Some(category) = patch.category {
            qb.push(", category = ");
            qb.push_bind(category.as_str());
        }
        if let Some(storage_path) = patch.storage_path {
            qb.push(", storage_path = ");
            qb.push_bind(storage_path);
        }
        if let Some(status) = patch.status {
            qb.push(", status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(deleted_at) = patch.deleted_at {
            qb.push(", deleted_at = ");
            qb.push_bind(deleted_at);
        }

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(format!(" RETURNING {COLUMNS}"));

        let row: Option<FileRow> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(AppError::NotFound(format!("File {} not found", id))),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete"))]
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update"))]
    async fn claim_merge(&self, upload_id: &str) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            UPDATE files
            SET status = 'merging', updated_at = NOW()
            WHERE upload_id = $1 AND status = 'uploading'
            RETURNING {COLUMNS}
            "#
        ))
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(FileRecord::try_from).transpose()
    }
}
