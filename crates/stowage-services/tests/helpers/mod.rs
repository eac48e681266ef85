//! Shared setup for service integration tests: an in-memory metadata index
//! plus tempdir-backed blob and scratch roots.

use std::sync::Arc;
use stowage_db::InMemoryFileRepository;
use stowage_storage::{BlobStore, ScratchSpace};
use tempfile::TempDir;

pub struct TestEnv {
    pub repository: Arc<InMemoryFileRepository>,
    pub blob_store: BlobStore,
    pub scratch: ScratchSpace,
    // Held so the directories outlive the test.
    pub _blob_dir: TempDir,
    pub _scratch_dir: TempDir,
}

pub async fn test_env() -> TestEnv {
    let blob_dir = tempfile::tempdir().unwrap();
    let scratch_dir = tempfile::tempdir().unwrap();

    TestEnv {
        repository: Arc::new(InMemoryFileRepository::new()),
        blob_store: BlobStore::new(blob_dir.path()).await.unwrap(),
        scratch: ScratchSpace::new(scratch_dir.path()).await.unwrap(),
        _blob_dir: blob_dir,
        _scratch_dir: scratch_dir,
    }
}

/// Build an in-memory zip archive from (entry name, contents) pairs.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;

    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::FileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    buffer.into_inner()
}

/// Encode a solid-color PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Vec::new();
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([40, 120, 200, 255]));
    image::DynamicImage::ImageRgba8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageFormat::Png,
        )
        .unwrap();
    buffer
}
