//! Shared application state handed to every handler.

use sqlx::PgPool;
use std::sync::Arc;
use stowage_core::Config;
use stowage_db::FileRepository;
use stowage_processing::ImageTranscoder;
use stowage_services::{ArchiveBundler, ArchiveIngester, ChunkAssembler, ReconciliationScanner};
use stowage_storage::{BlobStore, ScratchSpace};

pub struct AppState {
    pub config: Config,
    pub db_pool: PgPool,
    pub repository: Arc<dyn FileRepository>,
    pub blob_store: BlobStore,
    pub scratch: ScratchSpace,
    pub transcoder: ImageTranscoder,
    pub chunk_assembler: Arc<ChunkAssembler>,
    pub archive_ingester: Arc<ArchiveIngester>,
    pub archive_bundler: Arc<ArchiveBundler>,
    pub reconciliation: Arc<ReconciliationScanner>,
}
