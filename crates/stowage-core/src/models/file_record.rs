//! The file record - the durable unit of metadata.
//!
//! A `FileRecord` describes one object in the blob store: where it lives
//! (`category` + `storage_path`), what it is (`mime_type`, `size_bytes`),
//! who put it there (`owner_id`, `credential_id`), and where it is in its
//! lifecycle (`status`, `deleted_at`). Chunked uploads additionally carry
//! the upload id and the chunk total fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Blob store partition a file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Images,
    Docs,
    Videos,
    Audios,
    Zips,
    Others,
}

impl Category {
    /// All partitions, in the order they are created under the blob root.
    pub const ALL: [Category; 6] = [
        Category::Images,
        Category::Docs,
        Category::Videos,
        Category::Audios,
        Category::Zips,
        Category::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Docs => "docs",
            Category::Videos => "videos",
            Category::Audios => "audios",
            Category::Zips => "zips",
            Category::Others => "others",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "images" => Some(Category::Images),
            "docs" => Some(Category::Docs),
            "videos" => Some(Category::Videos),
            "audios" => Some(Category::Audios),
            "zips" => Some(Category::Zips),
            "others" => Some(Category::Others),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload lifecycle state.
///
/// `uploading → merging → completed`; `uploading → failed`; `merging → failed`.
/// `completed` and `failed` are terminal. A failed upload is not auto-retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Merging,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Uploading => "uploading",
            UploadStatus::Merging => "merging",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<UploadStatus> {
        match s {
            "uploading" => Some(UploadStatus::Uploading),
            "merging" => Some(UploadStatus::Merging),
            "completed" => Some(UploadStatus::Completed),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Visibility> {
        match s {
            "private" => Some(Visibility::Private),
            "public" => Some(Visibility::Public),
            _ => None,
        }
    }
}

/// How a record entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileSource {
    Upload,
    Chunked,
    Archive,
}

impl FileSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSource::Upload => "upload",
            FileSource::Chunked => "chunked",
            FileSource::Archive => "archive",
        }
    }

    pub fn parse(s: &str) -> Option<FileSource> {
        match s {
            "upload" => Some(FileSource::Upload),
            "chunked" => Some(FileSource::Chunked),
            "archive" => Some(FileSource::Archive),
            _ => None,
        }
    }
}

/// One file in the metadata index.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileRecord {
    /// Store-assigned identifier, immutable.
    pub id: Uuid,
    /// Name the caller supplied.
    pub original_name: String,
    /// Name actually used on disk. Unique within the store namespace.
    pub stored_name: String,
    /// Post-ingestion content type (updated after merge/transcode).
    pub mime_type: String,
    /// Post-ingestion size in bytes.
    pub size_bytes: i64,
    /// Blob store partition.
    pub category: Category,
    /// Relative key `<category>/<stored_name>`; required once completed.
    pub storage_path: Option<String>,
    /// Opaque principal that owns the file (access checks only).
    pub owner_id: Option<Uuid>,
    /// Credential the upload arrived through.
    pub credential_id: Option<Uuid>,
    pub visibility: Visibility,
    pub status: UploadStatus,
    pub is_chunked: bool,
    /// Fixed at creation for chunked uploads, never mutated.
    pub expected_chunk_count: Option<i32>,
    /// Caller-supplied upload id; lookup key for chunk submissions.
    pub upload_id: Option<String>,
    pub source: FileSource,
    /// Soft-delete marker. A soft-deleted record still owns its bytes.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Whether the record is live (not soft-deleted).
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Input for creating a record; id and timestamps are store-assigned.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub category: Category,
    pub storage_path: Option<String>,
    pub owner_id: Option<Uuid>,
    pub credential_id: Option<Uuid>,
    pub visibility: Visibility,
    pub status: UploadStatus,
    pub is_chunked: bool,
    pub expected_chunk_count: Option<i32>,
    pub upload_id: Option<String>,
    pub source: FileSource,
}

/// Partial update applied by `update_by_id`. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub stored_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub category: Option<Category>,
    pub storage_path: Option<Option<String>>,
    pub status: Option<UploadStatus>,
    /// `Some(None)` clears the soft-delete marker (restore).
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.stored_name.is_none()
            && self.mime_type.is_none()
            && self.size_bytes.is_none()
            && self.category.is_none()
            && self.storage_path.is_none()
            && self.status.is_none()
            && self.deleted_at.is_none()
    }
}

/// Filter for `find`. All set fields are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub upload_id: Option<String>,
    pub status: Option<UploadStatus>,
    pub source: Option<FileSource>,
    /// When false (default), soft-deleted records are included.
    /// Reconciliation relies on seeing them.
    pub live_only: bool,
}

impl RecordFilter {
    /// Match everything, including soft-deleted records.
    pub fn all() -> Self {
        Self::default()
    }
}
