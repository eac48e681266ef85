pub mod bundler;
pub mod ingester;

pub use bundler::ArchiveBundler;
pub use ingester::{ArchiveIngester, IngestOptions, IngestOutcome, SkippedEntry};
