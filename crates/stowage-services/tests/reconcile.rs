mod helpers;

use chrono::Utc;
use helpers::test_env;
use stowage_core::models::{
    Category, FileSource, NewFileRecord, RecordPatch, UploadStatus, Visibility,
};
use stowage_db::FileRepository;
use stowage_services::ReconciliationScanner;

async fn scanner(env: &helpers::TestEnv) -> ReconciliationScanner {
    ReconciliationScanner::new(
        env.repository.clone(),
        env.blob_store.clone(),
        env.scratch.clone(),
    )
}

fn completed_record(stored_name: &str, storage_path: &str) -> NewFileRecord {
    NewFileRecord {
        original_name: stored_name.to_string(),
        stored_name: stored_name.to_string(),
        mime_type: "application/octet-stream".to_string(),
        size_bytes: 1,
        category: Category::Others,
        storage_path: Some(storage_path.to_string()),
        owner_id: None,
        credential_id: None,
        visibility: Visibility::Private,
        status: UploadStatus::Completed,
        is_chunked: false,
        expected_chunk_count: None,
        upload_id: None,
        source: FileSource::Upload,
    }
}

#[tokio::test]
async fn dry_run_reports_ghost_file_without_deleting() {
    let env = test_env().await;
    let scanner = scanner(&env).await;

    let key = env
        .blob_store
        .put(Category::Others, "ghost.bin", b"unreferenced")
        .await
        .unwrap();

    let report = scanner.reconcile(true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.orphan_files, vec![key.clone()]);
    assert!(env.blob_store.exists(&key).await.unwrap());

    let report = scanner.reconcile(false).await.unwrap();
    assert_eq!(report.orphan_files, vec![key.clone()]);
    assert!(!env.blob_store.exists(&key).await.unwrap());
}

#[tokio::test]
async fn referenced_files_are_not_orphans() {
    let env = test_env().await;
    let scanner = scanner(&env).await;

    let key = env
        .blob_store
        .put(Category::Docs, "kept.pdf", b"%PDF")
        .await
        .unwrap();
    env.repository
        .create(completed_record("kept.pdf", &key))
        .await
        .unwrap();

    let report = scanner.reconcile(false).await.unwrap();
    assert!(report.orphan_files.is_empty());
    assert!(report.orphan_records.is_empty());
    assert!(env.blob_store.exists(&key).await.unwrap());
}

#[tokio::test]
async fn soft_deleted_record_still_owns_its_bytes() {
    let env = test_env().await;
    let scanner = scanner(&env).await;

    let key = env
        .blob_store
        .put(Category::Others, "trashed.bin", b"soft")
        .await
        .unwrap();
    let record = env
        .repository
        .create(completed_record("trashed.bin", &key))
        .await
        .unwrap();
    env.repository
        .update_by_id(
            record.id,
            RecordPatch {
                deleted_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let report = scanner.reconcile(false).await.unwrap();
    assert!(report.orphan_files.is_empty());
    assert!(env.blob_store.exists(&key).await.unwrap());
}

#[tokio::test]
async fn record_without_backing_bytes_is_removed() {
    let env = test_env().await;
    let scanner = scanner(&env).await;

    let record = env
        .repository
        .create(completed_record("gone.bin", "others/gone.bin"))
        .await
        .unwrap();

    let report = scanner.reconcile(true).await.unwrap();
    assert_eq!(report.orphan_records, vec![record.id]);
    assert!(env
        .repository
        .find_by_id(record.id)
        .await
        .unwrap()
        .is_some());

    let report = scanner.reconcile(false).await.unwrap();
    assert_eq!(report.orphan_records, vec![record.id]);
    assert!(env
        .repository
        .find_by_id(record.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn scratch_namespaces_are_purged() {
    let env = test_env().await;
    let scanner = scanner(&env).await;

    env.scratch.write_chunk("stale", 0, b"x").await.unwrap();
    let staging = env.scratch.create_staging().await.unwrap();

    let report = scanner.reconcile(true).await.unwrap();
    assert_eq!(report.purged_scratch_dirs.len(), 2);
    // Dry run leaves scratch intact.
    assert_eq!(env.scratch.count_chunks("stale").await.unwrap(), 1);
    assert!(staging.exists());

    let report = scanner.reconcile(false).await.unwrap();
    assert_eq!(report.purged_scratch_dirs.len(), 2);
    assert_eq!(env.scratch.count_chunks("stale").await.unwrap(), 0);
    assert!(!staging.exists());
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let env = test_env().await;
    let scanner = scanner(&env).await;

    env.blob_store
        .put(Category::Others, "ghost.bin", b"x")
        .await
        .unwrap();
    env.repository
        .create(completed_record("gone.bin", "others/gone.bin"))
        .await
        .unwrap();
    env.scratch.write_chunk("stale", 0, b"x").await.unwrap();

    let first = scanner.reconcile(false).await.unwrap();
    assert_eq!(first.orphan_files.len(), 1);
    assert_eq!(first.orphan_records.len(), 1);
    assert_eq!(first.purged_scratch_dirs.len(), 1);

    let second = scanner.reconcile(false).await.unwrap();
    assert!(second.orphan_files.is_empty());
    assert!(second.orphan_records.is_empty());
    assert!(second.purged_scratch_dirs.is_empty());
}
