//! Direct single-file upload.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use stowage_core::models::{Category, FileSource, NewFileRecord, UploadStatus, Visibility};
use stowage_core::AppError;
use stowage_storage::classify;
use uuid::Uuid;

use crate::auth::PrincipalContext;
use crate::error::HttpAppError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

/// Upload a single file
#[utoipa::path(
    post,
    path = "/api/v0/files",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = stowage_core::models::FileRecord),
        (status = 400, description = "Missing or invalid file field", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 413, description = "File exceeds the size limit", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    principal: PrincipalContext,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some(FILE_FIELD) {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| AppError::InvalidRequest("File field has no filename".into()))?;
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidRequest(format!("Failed to read file: {}", e)))?;
            upload = Some((file_name, data));
            break;
        }
    }

    let (original_name, data) = upload.ok_or_else(|| {
        AppError::InvalidRequest(format!("Missing multipart field '{}'", FILE_FIELD))
    })?;
    if data.is_empty() {
        return Err(HttpAppError(AppError::InvalidRequest(
            "File is empty".to_string(),
        )));
    }
    if data.len() > state.config.max_file_size_bytes {
        return Err(HttpAppError(AppError::PayloadTooLarge(format!(
            "{} bytes exceeds max {} bytes",
            data.len(),
            state.config.max_file_size_bytes
        ))));
    }

    let (mut mime_type, category) = classify(&original_name);

    // Images are converted to webp on the way in. A file that merely claims
    // to be an image is stored untouched.
    let (bytes, stored_name) = if category == Category::Images {
        match state.transcoder.transcode(data.clone(), &original_name).await {
            Ok(outcome) => {
                mime_type = outcome.content_type;
                (outcome.bytes, format!("{}.webp", Uuid::new_v4()))
            }
            Err(e) => {
                tracing::warn!(file = %original_name, error = %e, "Transcode failed, storing original");
                (data, generated_name(&original_name))
            }
        }
    } else {
        (data, generated_name(&original_name))
    };

    let category = stowage_storage::category_for_mime(mime_type);
    let size_bytes = bytes.len() as i64;
    let key = state
        .blob_store
        .put(category, &stored_name, &bytes)
        .await
        .map_err(HttpAppError::from)?;

    let record = state
        .repository
        .create(NewFileRecord {
            original_name,
            stored_name,
            mime_type: mime_type.to_string(),
            size_bytes,
            category,
            storage_path: Some(key),
            owner_id: principal.owner_id,
            credential_id: Some(principal.credential_id),
            visibility: Visibility::Private,
            status: UploadStatus::Completed,
            is_chunked: false,
            expected_chunk_count: None,
            upload_id: None,
            source: FileSource::Upload,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

fn generated_name(original_name: &str) -> String {
    match std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
    {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}
