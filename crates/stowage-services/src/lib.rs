//! Stowage Services Library
//!
//! The ingestion and reconciliation pipeline: chunked-upload assembly,
//! archive ingestion, and the scanner that repairs drift between the blob
//! store and the metadata index.

pub mod archive;
pub mod chunk;
pub mod reconcile;

pub use archive::{ArchiveBundler, ArchiveIngester, IngestOptions, IngestOutcome, SkippedEntry};
pub use chunk::{ChunkAssembler, SubmitOutcome};
pub use reconcile::{ReconcileReport, ReconciliationScanner};
