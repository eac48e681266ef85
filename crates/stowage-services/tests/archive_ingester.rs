mod helpers;

use helpers::{build_zip, png_bytes, test_env};
use stowage_core::models::{Category, FileSource, UploadStatus};
use stowage_core::AppError;
use stowage_processing::ImageTranscoder;
use stowage_services::{ArchiveIngester, IngestOptions};

async fn ingester() -> (ArchiveIngester, helpers::TestEnv) {
    let env = test_env().await;
    let ingester = ArchiveIngester::new(
        env.repository.clone(),
        env.blob_store.clone(),
        env.scratch.clone(),
        ImageTranscoder::new(1024, 70.0),
    );
    (ingester, env)
}

async fn write_archive(env: &helpers::TestEnv, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let key = env
        .blob_store
        .put(Category::Zips, name, bytes)
        .await
        .unwrap();
    env.blob_store.root().join(key)
}

#[tokio::test]
async fn every_entry_becomes_a_record_and_staging_is_clean() {
    let (ingester, env) = ingester().await;

    let png = png_bytes(8, 8);
    let zip = build_zip(&[
        ("notes.txt", b"hello" as &[u8]),
        ("nested/deep/data.bin", b"\x00\x01\x02"),
        ("photo.png", &png),
    ]);
    let archive_path = write_archive(&env, "bundle.zip", &zip).await;

    let outcome = ingester
        .ingest(&archive_path, IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 3);
    assert!(outcome.skipped_transcodes.is_empty());

    for record in &outcome.records {
        assert_eq!(record.status, UploadStatus::Completed);
        assert_eq!(record.source, FileSource::Archive);
        let key = record.storage_path.as_deref().unwrap();
        assert!(env.blob_store.exists(key).await.unwrap());
    }

    let photo = outcome
        .records
        .iter()
        .find(|r| r.original_name == "photo.png")
        .unwrap();
    assert_eq!(photo.category, Category::Images);
    assert_eq!(photo.mime_type, "image/webp");

    let notes = outcome
        .records
        .iter()
        .find(|r| r.original_name == "notes.txt")
        .unwrap();
    assert_eq!(notes.category, Category::Docs);
    assert_eq!(notes.size_bytes, 5);

    // Nothing left behind: no staging residue, no original archive.
    assert!(env.scratch.list_all().await.unwrap().is_empty());
    assert!(!archive_path.exists());
}

#[tokio::test]
async fn corrupt_image_is_ingested_untranscoded() {
    let (ingester, env) = ingester().await;

    let zip = build_zip(&[
        ("good.txt", b"fine" as &[u8]),
        ("broken.png", b"definitely not a png"),
        ("also-good.pdf", b"%PDF-1.4"),
    ]);
    let archive_path = write_archive(&env, "mixed.zip", &zip).await;

    let outcome = ingester
        .ingest(&archive_path, IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.skipped_transcodes.len(), 1);
    assert_eq!(outcome.skipped_transcodes[0].entry_name, "broken.png");

    let broken = outcome
        .records
        .iter()
        .find(|r| r.original_name == "broken.png")
        .unwrap();
    // Classified by extension, stored untouched.
    assert_eq!(broken.mime_type, "image/png");
    let bytes = env
        .blob_store
        .read(broken.storage_path.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(bytes, b"definitely not a png");
}

#[tokio::test]
async fn preserve_original_names_keeps_base_names() {
    let (ingester, env) = ingester().await;

    let png = png_bytes(4, 4);
    let zip = build_zip(&[("report.pdf", b"%PDF" as &[u8]), ("logo.png", &png)]);
    let archive_path = write_archive(&env, "named.zip", &zip).await;

    let outcome = ingester
        .ingest(
            &archive_path,
            IngestOptions {
                preserve_original_names: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let names: Vec<&str> = outcome
        .records
        .iter()
        .map(|r| r.stored_name.as_str())
        .collect();
    assert!(names.contains(&"report.pdf"));
    // Transcoded image keeps its stem, extension becomes webp.
    assert!(names.contains(&"logo.webp"));
}

#[tokio::test]
async fn preserved_duplicate_base_names_do_not_overwrite_each_other() {
    let (ingester, env) = ingester().await;

    let zip = build_zip(&[
        ("a/readme.txt", b"contents-A" as &[u8]),
        ("b/readme.txt", b"contents-B"),
    ]);
    let archive_path = write_archive(&env, "dupes.zip", &zip).await;

    let outcome = ingester
        .ingest(
            &archive_path,
            IngestOptions {
                preserve_original_names: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 2);
    assert_ne!(outcome.records[0].stored_name, outcome.records[1].stored_name);

    // Both entries' bytes survive under their own keys.
    let mut contents = Vec::new();
    for record in &outcome.records {
        let bytes = env
            .blob_store
            .read(record.storage_path.as_deref().unwrap())
            .await
            .unwrap();
        contents.push(bytes);
    }
    contents.sort();
    assert_eq!(contents, vec![b"contents-A".to_vec(), b"contents-B".to_vec()]);

    let names: Vec<&str> = outcome
        .records
        .iter()
        .map(|r| r.stored_name.as_str())
        .collect();
    assert!(names.contains(&"readme.txt"));
    assert!(names.contains(&"readme-1.txt"));
}

#[tokio::test]
async fn multi_megabyte_entry_round_trips_intact() {
    let (ingester, env) = ingester().await;

    let big: Vec<u8> = (0..2 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    let zip = build_zip(&[("payload.bin", big.as_slice())]);
    let archive_path = write_archive(&env, "big.zip", &zip).await;

    let outcome = ingester
        .ingest(&archive_path, IngestOptions::default())
        .await
        .unwrap();

    let record = &outcome.records[0];
    assert_eq!(record.size_bytes, big.len() as i64);
    let bytes = env
        .blob_store
        .read(record.storage_path.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(bytes, big);
}

#[tokio::test]
async fn generated_names_keep_extension() {
    let (ingester, env) = ingester().await;

    let zip = build_zip(&[("clip.mp4", b"not really video" as &[u8])]);
    let archive_path = write_archive(&env, "v.zip", &zip).await;

    let outcome = ingester
        .ingest(&archive_path, IngestOptions::default())
        .await
        .unwrap();

    let record = &outcome.records[0];
    assert_ne!(record.stored_name, "clip.mp4");
    assert!(record.stored_name.ends_with(".mp4"));
    assert_eq!(record.category, Category::Videos);
}

#[tokio::test]
async fn unreadable_archive_is_fatal_but_still_cleaned_up() {
    let (ingester, env) = ingester().await;

    let archive_path = write_archive(&env, "garbage.zip", b"this is not a zip").await;

    let result = ingester
        .ingest(&archive_path, IngestOptions::default())
        .await;
    assert!(matches!(result, Err(AppError::Corrupt(_))));

    // Cleanup runs on the failure path too.
    assert!(env.scratch.list_all().await.unwrap().is_empty());
    assert!(!archive_path.exists());
}

#[tokio::test]
async fn traversal_entries_abort_extraction() {
    let (ingester, env) = ingester().await;

    let zip = build_zip(&[
        ("fine.txt", b"ok" as &[u8]),
        ("../escape.txt", b"gotcha"),
    ]);
    let archive_path = write_archive(&env, "evil.zip", &zip).await;

    let result = ingester
        .ingest(&archive_path, IngestOptions::default())
        .await;
    assert!(matches!(result, Err(AppError::Corrupt(_))));

    // Nothing escaped past the staging root.
    assert!(!env.scratch.root().parent().unwrap().join("escape.txt").exists());
    assert!(env.scratch.list_all().await.unwrap().is_empty());
}
