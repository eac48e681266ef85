//! Soft delete, hard delete, and restore.
//!
//! Soft delete tombstones the record but keeps the bytes, so restore is a
//! metadata-only operation. Hard delete removes both.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use stowage_core::models::{FileRecord, RecordPatch};
use stowage_core::AppError;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::PrincipalContext;
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteQuery {
    /// Remove the record and its bytes instead of tombstoning.
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestoreRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

/// Remove a record's bytes, any leftover chunk scratch dir, and the record.
async fn hard_delete(state: &AppState, record: &FileRecord) -> Result<(), HttpAppError> {
    if let Some(key) = record.storage_path.as_deref() {
        state
            .blob_store
            .delete(key)
            .await
            .map_err(HttpAppError::from)?;
    }
    // A chunked upload may still have a scratch dir of staged chunks.
    if let Some(upload_id) = record.upload_id.as_deref() {
        if let Err(e) = state.scratch.remove_chunk_dir(upload_id).await {
            tracing::warn!(upload_id = %upload_id, error = %e, "Failed to remove chunk scratch dir");
        }
    }
    state.repository.delete_by_id(record.id).await?;
    Ok(())
}

/// Delete a file
#[utoipa::path(
    delete,
    path = "/api/v0/files/{id}",
    params(("id" = Uuid, Path, description = "File record id"), DeleteQuery),
    responses(
        (status = 200, description = "File soft deleted", body = stowage_core::models::FileRecord),
        (status = 204, description = "File hard deleted"),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 404, description = "No record with that id", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    _principal: PrincipalContext,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state
        .repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No file with id {}", id)))?;

    if query.hard {
        hard_delete(&state, &record).await?;
        tracing::info!(file_id = %id, "File hard deleted");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    if record.deleted_at.is_some() {
        return Err(HttpAppError(AppError::Conflict(format!(
            "File {} is already deleted",
            id
        ))));
    }

    let record = state
        .repository
        .update_by_id(
            id,
            RecordPatch {
                deleted_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await?;
    tracing::info!(file_id = %id, "File soft deleted");
    Ok(Json(record).into_response())
}

/// Restore soft-deleted files
#[utoipa::path(
    post,
    path = "/api/v0/files/restore",
    request_body = RestoreRequest,
    responses(
        (status = 200, description = "Files restored", body = Vec<stowage_core::models::FileRecord>),
        (status = 400, description = "Empty id list", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 404, description = "Some id has no record", body = crate::error::ErrorResponse),
        (status = 409, description = "Some file is not deleted", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn restore_files(
    State(state): State<Arc<AppState>>,
    _principal: PrincipalContext,
    Json(request): Json<RestoreRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.ids.is_empty() {
        return Err(HttpAppError(AppError::InvalidRequest(
            "ids must not be empty".to_string(),
        )));
    }

    // Validate the whole batch before touching anything, so a bad id does
    // not leave the batch half restored.
    for id in &request.ids {
        let record = state
            .repository
            .find_by_id(*id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No file with id {}", id)))?;
        if record.deleted_at.is_none() {
            return Err(HttpAppError(AppError::Conflict(format!(
                "File {} is not deleted",
                id
            ))));
        }
    }

    let mut restored = Vec::with_capacity(request.ids.len());
    for id in &request.ids {
        let record = state
            .repository
            .update_by_id(
                *id,
                RecordPatch {
                    deleted_at: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        restored.push(record);
    }

    tracing::info!(restored = restored.len(), "Files restored");
    Ok(Json(restored))
}

/// Delete many files
#[utoipa::path(
    post,
    path = "/api/v0/files/bulk-delete",
    params(DeleteQuery),
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Files soft deleted", body = Vec<stowage_core::models::FileRecord>),
        (status = 204, description = "Files hard deleted"),
        (status = 400, description = "Empty id list", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 404, description = "Some id has no record", body = crate::error::ErrorResponse),
        (status = 409, description = "Some file is already deleted", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    _principal: PrincipalContext,
    Query(query): Query<DeleteQuery>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.ids.is_empty() {
        return Err(HttpAppError(AppError::InvalidRequest(
            "ids must not be empty".to_string(),
        )));
    }

    // Validate the whole batch before touching anything, so a bad id does
    // not leave the batch half deleted.
    let mut records = Vec::with_capacity(request.ids.len());
    for id in &request.ids {
        let record = state
            .repository
            .find_by_id(*id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No file with id {}", id)))?;
        if !query.hard && record.deleted_at.is_some() {
            return Err(HttpAppError(AppError::Conflict(format!(
                "File {} is already deleted",
                id
            ))));
        }
        records.push(record);
    }

    if query.hard {
        for record in &records {
            hard_delete(&state, record).await?;
        }
        tracing::info!(deleted = records.len(), "Files hard deleted");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let mut deleted = Vec::with_capacity(records.len());
    for record in &records {
        let record = state
            .repository
            .update_by_id(
                record.id,
                RecordPatch {
                    deleted_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await?;
        deleted.push(record);
    }

    tracing::info!(deleted = deleted.len(), "Files soft deleted");
    Ok(Json(deleted).into_response())
}
