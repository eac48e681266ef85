pub mod assembler;

pub use assembler::{ChunkAssembler, SubmitOutcome};
