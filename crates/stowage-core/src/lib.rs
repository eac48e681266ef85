//! Stowage Core Library
//!
//! Domain models, error types, and configuration shared by all Stowage crates.

pub mod config;
pub mod error;
pub mod models;

pub use config::{ApiKeyEntry, Config};
pub use error::{AppError, ErrorMetadata, LogLevel};
