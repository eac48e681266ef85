//! Stowage Database Library
//!
//! The metadata index behind a `FileRepository` trait, with a Postgres
//! implementation for production and an in-memory one for tests.

pub mod memory;
pub mod postgres;
pub mod repository;

pub use memory::InMemoryFileRepository;
pub use postgres::PgFileRepository;
pub use repository::FileRepository;
