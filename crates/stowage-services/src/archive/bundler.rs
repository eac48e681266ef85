//! Bundling stored blobs into a single zip for bulk download.
//!
//! The inverse of ingestion: every requested record's bytes are read from
//! the blob store and packed into one archive, entries named by their
//! stored name. A record without stored bytes fails the whole bundle; the
//! caller validated the batch and a silent partial archive would be worse
//! than an error.

use bytes::Bytes;
use stowage_core::models::FileRecord;
use stowage_core::AppError;
use stowage_storage::{BlobStore, StorageError};

pub struct ArchiveBundler {
    blob_store: BlobStore,
}

impl ArchiveBundler {
    pub fn new(blob_store: BlobStore) -> Self {
        Self { blob_store }
    }

    /// Pack the records' blobs into one zip archive.
    #[tracing::instrument(skip(self, records), fields(entries = records.len()))]
    pub async fn bundle(&self, records: &[FileRecord]) -> Result<Bytes, AppError> {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let key = record.storage_path.as_deref().ok_or_else(|| {
                AppError::NotFound(format!("File {} has no stored content", record.id))
            })?;
            let data = self.blob_store.read(key).await.map_err(|e| match e {
                StorageError::NotFound(key) => {
                    AppError::NotFound(format!("Stored bytes missing for {}", key))
                }
                other => AppError::StorageFailure(other.to_string()),
            })?;
            entries.push((record.stored_name.clone(), data));
        }

        let archive = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, AppError> {
            use std::io::Write;

            let mut cursor = std::io::Cursor::new(Vec::new());
            {
                let mut writer = zip::ZipWriter::new(&mut cursor);
                let options = zip::write::FileOptions::default();
                for (name, data) in &entries {
                    writer.start_file(name.as_str(), options).map_err(|e| {
                        AppError::Internal(format!("Failed to start zip entry {}: {}", name, e))
                    })?;
                    writer.write_all(data).map_err(|e| {
                        AppError::Internal(format!("Failed to write zip entry {}: {}", name, e))
                    })?;
                }
                writer
                    .finish()
                    .map_err(|e| AppError::Internal(format!("Failed to finish zip: {}", e)))?;
            }
            Ok(cursor.into_inner())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Bundle task panicked: {}", e)))??;

        tracing::info!(size_bytes = archive.len(), "Bundle built");

        Ok(Bytes::from(archive))
    }
}
