//! Archive (zip) ingestion.
//!
//! The archive is expanded into a fresh staging directory, never directly
//! into the blob store, so a malformed archive cannot land partial entries
//! in the canonical namespace. Entries whose resolved path would escape the
//! staging directory abort extraction.
//!
//! Entries are independent: a transcode failure on one image is recorded
//! and the entry is ingested untranscoded; only a corrupt archive or a
//! staging failure is fatal. The staging directory and the original archive
//! are removed after the result is captured, whatever the outcome.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage_core::models::{Category, FileRecord, FileSource, NewFileRecord, UploadStatus, Visibility};
use stowage_core::AppError;
use stowage_db::FileRepository;
use stowage_processing::ImageTranscoder;
use stowage_storage::{classify, BlobStore, ScratchSpace};
use uuid::Uuid;

/// Per-ingestion options.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Keep each entry's base name for the stored object (extension
    /// replaced for transcoded images). Otherwise a generated name is used.
    pub preserve_original_names: bool,
    pub owner_id: Option<Uuid>,
    pub credential_id: Option<Uuid>,
}

/// An entry whose transcode failed; it was ingested untranscoded.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct SkippedEntry {
    pub entry_name: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub records: Vec<FileRecord>,
    pub skipped_transcodes: Vec<SkippedEntry>,
}

pub struct ArchiveIngester {
    repository: Arc<dyn FileRepository>,
    blob_store: BlobStore,
    scratch: ScratchSpace,
    transcoder: ImageTranscoder,
}

impl ArchiveIngester {
    pub fn new(
        repository: Arc<dyn FileRepository>,
        blob_store: BlobStore,
        scratch: ScratchSpace,
        transcoder: ImageTranscoder,
    ) -> Self {
        Self {
            repository,
            blob_store,
            scratch,
            transcoder,
        }
    }

    /// Ingest every regular file in the archive at `archive_path`.
    ///
    /// The archive file itself is consumed: it is deleted along with the
    /// staging directory once the result is known.
    #[tracing::instrument(skip(self, options), fields(archive = %archive_path.display()))]
    pub async fn ingest(
        &self,
        archive_path: &Path,
        options: IngestOptions,
    ) -> Result<IngestOutcome, AppError> {
        let staging = self
            .scratch
            .create_staging()
            .await
            .map_err(|e| AppError::StorageFailure(format!("Failed to create staging: {}", e)))?;

        let result = self.run(archive_path, &staging, &options).await;

        // Cleanup must never mask the primary result.
        if let Err(e) = self.scratch.remove_staging(&staging).await {
            tracing::error!(
                staging = %staging.display(),
                error = %e,
                "Failed to remove staging directory"
            );
        }
        match tokio::fs::remove_file(archive_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(
                    archive = %archive_path.display(),
                    error = %e,
                    "Failed to remove original archive"
                );
            }
        }

        result
    }

    async fn run(
        &self,
        archive_path: &Path,
        staging: &Path,
        options: &IngestOptions,
    ) -> Result<IngestOutcome, AppError> {
        extract_archive(archive_path.to_path_buf(), staging.to_path_buf()).await?;

        let entries = collect_files(staging).await?;

        let mut records = Vec::with_capacity(entries.len());
        let mut skipped_transcodes = Vec::new();

        for entry_path in entries {
            let entry_name = entry_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            let (record, skip) = self
                .ingest_entry(&entry_path, &entry_name, options)
                .await?;
            records.push(record);
            if let Some(skip) = skip {
                skipped_transcodes.push(skip);
            }
        }

        tracing::info!(
            entries = records.len(),
            skipped_transcodes = skipped_transcodes.len(),
            "Archive ingested"
        );

        Ok(IngestOutcome {
            records,
            skipped_transcodes,
        })
    }

    /// Classify, optionally transcode, relocate, and record one entry.
    async fn ingest_entry(
        &self,
        entry_path: &Path,
        entry_name: &str,
        options: &IngestOptions,
    ) -> Result<(FileRecord, Option<SkippedEntry>), AppError> {
        let (mut mime_type, mut category) = classify::classify(entry_name);
        let mut skip = None;

        let (storage_path, stored_name, size_bytes) = if category == Category::Images {
            let data = tokio::fs::read(entry_path).await.map_err(|e| {
                AppError::StorageFailure(format!(
                    "Failed to read staged entry {}: {}",
                    entry_path.display(),
                    e
                ))
            })?;

            match self
                .transcoder
                .transcode(Bytes::from(data), entry_name)
                .await
            {
                Ok(outcome) => {
                    mime_type = outcome.content_type;
                    let candidate = if options.preserve_original_names {
                        outcome.output_name
                    } else {
                        format!("{}.webp", Uuid::new_v4())
                    };
                    let stored_name = self.unique_stored_name(category, candidate).await?;
                    let size = outcome.bytes.len() as i64;
                    let key = self
                        .blob_store
                        .put(category, &stored_name, &outcome.bytes)
                        .await
                        .map_err(|e| AppError::StorageFailure(e.to_string()))?;
                    // The staged original is superseded by the transcoded
                    // bytes; staging cleanup removes it.
                    (key, stored_name, size)
                }
                Err(e) => {
                    tracing::warn!(
                        entry = %entry_name,
                        error = %e,
                        "Transcode failed; ingesting entry untranscoded"
                    );
                    skip = Some(SkippedEntry {
                        entry_name: entry_name.to_string(),
                        reason: e.to_string(),
                    });
                    self.move_untouched(entry_path, entry_name, category, options)
                        .await?
                }
            }
        } else {
            self.move_untouched(entry_path, entry_name, category, options)
                .await?
        };

        // Routing follows the final content type.
        category = classify::category_for_mime(mime_type);

        let record = self
            .repository
            .create(NewFileRecord {
                original_name: entry_name.to_string(),
                stored_name,
                mime_type: mime_type.to_string(),
                size_bytes,
                category,
                storage_path: Some(storage_path),
                owner_id: options.owner_id,
                credential_id: options.credential_id,
                visibility: Visibility::Private,
                status: UploadStatus::Completed,
                is_chunked: false,
                expected_chunk_count: None,
                upload_id: None,
                source: FileSource::Archive,
            })
            .await?;

        Ok((record, skip))
    }

    /// Move a staged entry into the blob store without transformation.
    async fn move_untouched(
        &self,
        entry_path: &Path,
        entry_name: &str,
        category: Category,
        options: &IngestOptions,
    ) -> Result<(String, String, i64), AppError> {
        let candidate = if options.preserve_original_names {
            entry_name.to_string()
        } else {
            match entry_name.rsplit_once('.') {
                Some((_, ext)) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext),
                _ => Uuid::new_v4().to_string(),
            }
        };
        let stored_name = self.unique_stored_name(category, candidate).await?;

        let size_bytes = tokio::fs::metadata(entry_path)
            .await
            .map_err(|e| AppError::StorageFailure(e.to_string()))?
            .len() as i64;

        let key = self
            .blob_store
            .move_in(entry_path, category, &stored_name)
            .await
            .map_err(|e| AppError::StorageFailure(e.to_string()))?;

        Ok((key, stored_name, size_bytes))
    }

    /// Pick a stored name with no existing blob in the partition. Preserved
    /// names get a numeric suffix on collision, so duplicate base names
    /// across archive directories cannot overwrite each other's bytes.
    async fn unique_stored_name(
        &self,
        category: Category,
        candidate: String,
    ) -> Result<String, AppError> {
        if !self.blob_exists(category, &candidate).await? {
            return Ok(candidate);
        }
        let (stem, ext) = match candidate.rsplit_once('.') {
            Some((stem, ext)) if !ext.is_empty() => (stem.to_string(), Some(ext.to_string())),
            _ => (candidate, None),
        };
        for n in 1..=999u32 {
            let next = match &ext {
                Some(ext) => format!("{}-{}.{}", stem, n, ext),
                None => format!("{}-{}", stem, n),
            };
            if !self.blob_exists(category, &next).await? {
                return Ok(next);
            }
        }
        Ok(match &ext {
            Some(ext) => format!("{}-{}.{}", stem, Uuid::new_v4(), ext),
            None => format!("{}-{}", stem, Uuid::new_v4()),
        })
    }

    async fn blob_exists(&self, category: Category, stored_name: &str) -> Result<bool, AppError> {
        self.blob_store
            .exists(&BlobStore::key_for(category, stored_name))
            .await
            .map_err(|e| AppError::StorageFailure(e.to_string()))
    }
}

/// Expand the archive into the staging directory on the blocking pool.
///
/// Any entry whose resolved path escapes the staging directory fails the
/// whole extraction.
async fn extract_archive(archive_path: PathBuf, staging: PathBuf) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || -> Result<(), AppError> {
        let file = std::fs::File::open(&archive_path).map_err(|e| {
            AppError::StorageFailure(format!(
                "Failed to open archive {}: {}",
                archive_path.display(),
                e
            ))
        })?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| AppError::Corrupt(format!("Failed to read archive: {}", e)))?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| AppError::Corrupt(format!("Failed to read archive entry: {}", e)))?;

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                return Err(AppError::Corrupt(format!(
                    "Archive entry escapes extraction root: {}",
                    entry.name()
                )));
            };

            let target = staging.join(relative);
            if entry.is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| {
                    AppError::StorageFailure(format!(
                        "Failed to create extracted directory {}: {}",
                        target.display(),
                        e
                    ))
                })?;
                continue;
            }

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::StorageFailure(e.to_string()))?;
            }

            let mut output = std::fs::File::create(&target).map_err(|e| {
                AppError::StorageFailure(format!(
                    "Failed to create extracted file {}: {}",
                    target.display(),
                    e
                ))
            })?;
            // Streamed copy: the declared entry size comes straight from
            // the archive header and must not drive an allocation.
            std::io::copy(&mut entry, &mut output)
                .map_err(|e| AppError::Corrupt(format!("Failed to decompress entry: {}", e)))?;
        }

        Ok(())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Collect every regular file under `root` with an explicit stack; archive
/// nesting depth must not be able to overflow the call stack.
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            AppError::StorageFailure(format!(
                "Failed to read staging directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::StorageFailure(e.to_string()))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| AppError::StorageFailure(e.to_string()))?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}
