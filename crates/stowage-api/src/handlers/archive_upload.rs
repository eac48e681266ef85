//! Zip archive ingestion.
//!
//! The uploaded archive is parked in the `zips` partition, every entry is
//! extracted, classified and relocated into its category partition, and the
//! archive itself is removed once ingestion finishes.

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::models::{Category, FileRecord};
use stowage_core::AppError;
use stowage_services::{IngestOptions, SkippedEntry};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::PrincipalContext;
use crate::error::HttpAppError;
use crate::state::AppState;

const ARCHIVE_FIELD: &str = "archive";

#[derive(Debug, Deserialize, IntoParams)]
pub struct ArchiveQuery {
    /// Keep each entry's base name instead of generating one.
    #[serde(default)]
    pub preserve_names: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArchiveIngestResponse {
    /// One record per archive entry.
    pub files: Vec<FileRecord>,
    /// Image entries that were ingested untranscoded.
    pub skipped_transcodes: Vec<SkippedEntry>,
}

/// Ingest a zip archive
#[utoipa::path(
    post,
    path = "/api/v0/archives",
    params(ArchiveQuery),
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Archive ingested", body = ArchiveIngestResponse),
        (status = 400, description = "Missing or invalid archive field", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 413, description = "Archive exceeds the size limit", body = crate::error::ErrorResponse),
        (status = 422, description = "Archive is unreadable or contains traversal entries", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "archives"
)]
pub async fn upload_archive(
    State(state): State<Arc<AppState>>,
    principal: PrincipalContext,
    Query(query): Query<ArchiveQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut archive_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some(ARCHIVE_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidRequest(format!("Failed to read archive: {}", e)))?;
            archive_bytes = Some(data);
            break;
        }
    }

    let data = archive_bytes.ok_or_else(|| {
        AppError::InvalidRequest(format!("Missing multipart field '{}'", ARCHIVE_FIELD))
    })?;
    if data.is_empty() {
        return Err(HttpAppError(AppError::InvalidRequest(
            "Archive is empty".to_string(),
        )));
    }
    if data.len() > state.config.max_archive_size_bytes {
        return Err(HttpAppError(AppError::PayloadTooLarge(format!(
            "{} bytes exceeds max {} bytes",
            data.len(),
            state.config.max_archive_size_bytes
        ))));
    }

    // Park the archive under zips/ so a crash before ingestion leaves it
    // findable by reconciliation instead of lost in a temp dir.
    let stored_name = format!("{}.zip", Uuid::new_v4());
    let key = state
        .blob_store
        .put(Category::Zips, &stored_name, &data)
        .await
        .map_err(HttpAppError::from)?;
    let archive_path = state.blob_store.root().join(&key);

    let outcome = state
        .archive_ingester
        .ingest(
            &archive_path,
            IngestOptions {
                preserve_original_names: query.preserve_names,
                owner_id: principal.owner_id,
                credential_id: Some(principal.credential_id),
            },
        )
        .await?;

    tracing::info!(
        files = outcome.records.len(),
        skipped_transcodes = outcome.skipped_transcodes.len(),
        preserve_names = query.preserve_names,
        "Archive ingested"
    );

    Ok((
        StatusCode::CREATED,
        Json(ArchiveIngestResponse {
            files: outcome.records,
            skipped_transcodes: outcome.skipped_transcodes,
        }),
    ))
}
