//! OpenAPI document assembly.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ErrorResponse;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::chunk_upload::submit_chunk,
        handlers::archive_upload::upload_archive,
        handlers::file_upload::upload_file,
        handlers::file_get::download_file,
        handlers::file_get::get_file,
        handlers::file_get::bulk_download,
        handlers::file_delete::delete_file,
        handlers::file_delete::bulk_delete,
        handlers::file_delete::restore_files,
        handlers::maintenance::reconcile,
    ),
    components(schemas(
        ErrorResponse,
        handlers::chunk_upload::ChunkSubmitResponse,
        handlers::archive_upload::ArchiveIngestResponse,
        handlers::file_get::BulkDownloadRequest,
        handlers::file_delete::BulkDeleteRequest,
        handlers::file_delete::RestoreRequest,
        stowage_core::models::FileRecord,
        stowage_core::models::Category,
        stowage_core::models::UploadStatus,
        stowage_core::models::Visibility,
        stowage_core::models::FileSource,
        stowage_services::ReconcileReport,
        stowage_services::SkippedEntry,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "chunks", description = "Chunked upload assembly"),
        (name = "archives", description = "Zip archive ingestion"),
        (name = "files", description = "File records and content"),
        (name = "maintenance", description = "Store and index reconciliation")
    ),
    info(
        title = "Stowage API",
        description = "Blob ingestion and reconciliation service"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Api-Key"))),
            );
        }
    }
}

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
