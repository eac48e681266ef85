//! Stowage Storage Library
//!
//! Filesystem primitives for the canonical blob store and the scratch
//! namespaces, plus MIME classification for filesystem routing.
//!
//! # Key format
//!
//! Blob store keys are relative paths `{category}/{stored_name}` under the
//! blob root. Keys must not contain `..` or a leading `/`. Scratch state
//! lives under a separate root: `chunks/{upload_id}/{index}` for chunk sets
//! and `staging/{random_id}/...` for archive extraction.

pub mod blob_store;
pub mod classify;
pub mod error;
pub mod scratch;

pub use blob_store::BlobStore;
pub use classify::{category_for_mime, classify, content_type_for};
pub use error::{StorageError, StorageResult};
pub use scratch::ScratchSpace;
