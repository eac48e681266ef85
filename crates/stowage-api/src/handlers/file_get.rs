//! File download and record lookup.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use stowage_core::AppError;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::PrincipalContext;
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDownloadRequest {
    pub ids: Vec<Uuid>,
}

/// Download file content
#[utoipa::path(
    get,
    path = "/api/v0/files/{id}",
    params(("id" = Uuid, Path, description = "File record id")),
    responses(
        (status = 200, description = "File bytes", content_type = "application/octet-stream"),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 404, description = "Record missing, soft deleted, or bytes gone from disk", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    _principal: PrincipalContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state
        .repository
        .find_by_id(id)
        .await?
        .filter(|r| r.is_live())
        .ok_or_else(|| AppError::NotFound(format!("No file with id {}", id)))?;

    let key = record
        .storage_path
        .as_deref()
        .ok_or_else(|| AppError::NotFound(format!("File {} has no stored content", id)))?;

    // Both probes map a missing key to 404.
    let length = state
        .blob_store
        .content_length(key)
        .await
        .map_err(HttpAppError::from)?;
    let stream = state
        .blob_store
        .read_stream(key)
        .await
        .map_err(HttpAppError::from)?;

    let headers = [
        (header::CONTENT_TYPE, record.mime_type.clone()),
        (header::CONTENT_LENGTH, length.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", record.stored_name),
        ),
    ];

    Ok((StatusCode::OK, headers, Body::from_stream(stream)))
}

/// Get a file record
#[utoipa::path(
    get,
    path = "/api/v0/files/{id}/info",
    params(("id" = Uuid, Path, description = "File record id")),
    responses(
        (status = 200, description = "File record", body = stowage_core::models::FileRecord),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 404, description = "No live record with that id", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    _principal: PrincipalContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state
        .repository
        .find_by_id(id)
        .await?
        .filter(|r| r.is_live())
        .ok_or_else(|| AppError::NotFound(format!("No file with id {}", id)))?;
    Ok(Json(record))
}

/// Download many files as one zip
#[utoipa::path(
    post,
    path = "/api/v0/files/bulk-download",
    request_body = BulkDownloadRequest,
    responses(
        (status = 200, description = "Zip archive of the requested files", content_type = "application/zip"),
        (status = 400, description = "Empty id list", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 404, description = "Some id has no live record or its bytes are gone", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn bulk_download(
    State(state): State<Arc<AppState>>,
    _principal: PrincipalContext,
    Json(request): Json<BulkDownloadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.ids.is_empty() {
        return Err(HttpAppError(AppError::InvalidRequest(
            "ids must not be empty".to_string(),
        )));
    }

    let mut records = Vec::with_capacity(request.ids.len());
    for id in &request.ids {
        let record = state
            .repository
            .find_by_id(*id)
            .await?
            .filter(|r| r.is_live())
            .ok_or_else(|| AppError::NotFound(format!("No file with id {}", id)))?;
        records.push(record);
    }

    let archive = state.archive_bundler.bundle(&records).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (header::CONTENT_LENGTH, archive.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"files.zip\"".to_string(),
        ),
    ];

    Ok((StatusCode::OK, headers, Body::from(archive)))
}
