//! Stowage Processing Library
//!
//! CPU-bound media transformations, kept off the async runtime via
//! `spawn_blocking`. Currently: WebP transcoding of ingested images.

pub mod transcoder;

pub use transcoder::{ImageTranscoder, TranscodeOutcome};
