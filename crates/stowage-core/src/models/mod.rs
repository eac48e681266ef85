//! Domain models

mod file_record;

pub use file_record::{
    Category, FileRecord, FileSource, NewFileRecord, RecordFilter, RecordPatch, UploadStatus,
    Visibility,
};
