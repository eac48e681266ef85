pub mod archive_upload;
pub mod chunk_upload;
pub mod file_delete;
pub mod file_get;
pub mod file_upload;
pub mod maintenance;
