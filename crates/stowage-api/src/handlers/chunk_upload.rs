//! Chunked upload submission.
//!
//! Clients split a payload into N chunks and PUT each one under the same
//! upload id. Chunks may arrive in any order; the submission that completes
//! the set also performs the merge and returns the finished record.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::models::FileRecord;
use stowage_core::AppError;
use stowage_services::SubmitOutcome;
use utoipa::{IntoParams, ToSchema};

use crate::auth::PrincipalContext;
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChunkQuery {
    /// Total number of chunks in this upload. Must be identical on every
    /// submission for the same upload id.
    pub total: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChunkSubmitResponse {
    /// More chunks are still outstanding.
    Partial { received: usize, expected: i32 },
    /// This submission completed the set; the merged file record.
    Completed { file: FileRecord },
}

/// Submit one chunk of a chunked upload
#[utoipa::path(
    put,
    path = "/api/v0/chunks/{upload_id}/{chunk_index}",
    params(
        ("upload_id" = String, Path, description = "Client-chosen upload identifier"),
        ("chunk_index" = i32, Path, description = "Zero-based chunk index"),
        ChunkQuery
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Upload completed, file merged", body = ChunkSubmitResponse),
        (status = 202, description = "Chunk accepted, upload incomplete", body = ChunkSubmitResponse),
        (status = 400, description = "Invalid chunk parameters", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 409, description = "Total mismatch or upload already terminal", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "chunks"
)]
pub async fn submit_chunk(
    State(state): State<Arc<AppState>>,
    principal: PrincipalContext,
    Path((upload_id, chunk_index)): Path<(String, i32)>,
    Query(query): Query<ChunkQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    if body.is_empty() {
        return Err(HttpAppError(AppError::InvalidRequest(
            "Chunk body must not be empty".to_string(),
        )));
    }

    let outcome = state
        .chunk_assembler
        .submit_chunk(
            &upload_id,
            chunk_index,
            query.total,
            body,
            principal.owner_id,
            Some(principal.credential_id),
        )
        .await?;

    let response = match outcome {
        SubmitOutcome::Partial { received, expected } => (
            StatusCode::ACCEPTED,
            Json(ChunkSubmitResponse::Partial { received, expected }),
        ),
        SubmitOutcome::Completed(record) => (
            StatusCode::OK,
            Json(ChunkSubmitResponse::Completed { file: record }),
        ),
    };
    Ok(response)
}
