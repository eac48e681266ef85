//! Application wiring: database, storage roots, services, routes.

pub mod database;
pub mod routes;
pub mod server;

use axum::Router;
use std::sync::Arc;
use stowage_core::Config;
use stowage_db::{FileRepository, PgFileRepository};
use stowage_processing::ImageTranscoder;
use stowage_services::{ArchiveBundler, ArchiveIngester, ChunkAssembler, ReconciliationScanner};
use stowage_storage::{BlobStore, ScratchSpace};

use crate::state::AppState;

pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router), anyhow::Error> {
    config.validate()?;

    let db_pool = database::setup_database(&config).await?;
    let repository: Arc<dyn FileRepository> = Arc::new(PgFileRepository::new(db_pool.clone()));

    let blob_store = BlobStore::new(&config.blob_root).await?;
    let scratch = ScratchSpace::new(&config.scratch_root).await?;
    let transcoder = ImageTranscoder::new(config.image_max_dimension, config.webp_quality);

    let chunk_assembler = Arc::new(ChunkAssembler::new(
        repository.clone(),
        blob_store.clone(),
        scratch.clone(),
        config.max_chunk_count,
    ));
    let archive_ingester = Arc::new(ArchiveIngester::new(
        repository.clone(),
        blob_store.clone(),
        scratch.clone(),
        transcoder,
    ));
    let archive_bundler = Arc::new(ArchiveBundler::new(blob_store.clone()));
    let reconciliation = Arc::new(ReconciliationScanner::new(
        repository.clone(),
        blob_store.clone(),
        scratch.clone(),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        db_pool,
        repository,
        blob_store,
        scratch,
        transcoder,
        chunk_assembler,
        archive_ingester,
        archive_bundler,
        reconciliation,
    });

    let router = routes::setup_routes(&config, state.clone()).await?;

    tracing::info!(
        blob_root = %config.blob_root.display(),
        scratch_root = %config.scratch_root.display(),
        "Application initialized"
    );

    Ok((state, router))
}
