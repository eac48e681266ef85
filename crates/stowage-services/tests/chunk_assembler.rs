mod helpers;

use bytes::Bytes;
use helpers::test_env;
use std::sync::Arc;
use stowage_core::models::UploadStatus;
use stowage_core::AppError;
use stowage_db::FileRepository;
use stowage_services::{ChunkAssembler, SubmitOutcome};

const MAX_CHUNKS: i32 = 10_000;

async fn assembler() -> (ChunkAssembler, helpers::TestEnv) {
    let env = test_env().await;
    let assembler = ChunkAssembler::new(
        env.repository.clone(),
        env.blob_store.clone(),
        env.scratch.clone(),
        MAX_CHUNKS,
    );
    (assembler, env)
}

#[tokio::test]
async fn out_of_order_submission_merges_in_index_order() {
    let (assembler, env) = assembler().await;

    let b0 = Bytes::from_static(b"first-");
    let b1 = Bytes::from_static(b"second-");
    let b2 = Bytes::from_static(b"third");

    let r1 = assembler
        .submit_chunk("u1", 1, 3, b1.clone(), None, None)
        .await
        .unwrap();
    assert!(matches!(r1, SubmitOutcome::Partial { received: 1, .. }));

    let r0 = assembler
        .submit_chunk("u1", 0, 3, b0.clone(), None, None)
        .await
        .unwrap();
    assert!(matches!(r0, SubmitOutcome::Partial { received: 2, .. }));

    let r2 = assembler
        .submit_chunk("u1", 2, 3, b2.clone(), None, None)
        .await
        .unwrap();
    let SubmitOutcome::Completed(record) = r2 else {
        panic!("third submission should complete the upload");
    };

    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.size_bytes, (b0.len() + b1.len() + b2.len()) as i64);

    let merged = env
        .blob_store
        .read(record.storage_path.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(merged, b"first-second-third");

    // Scratch state for the upload is fully consumed.
    assert_eq!(env.scratch.count_chunks("u1").await.unwrap(), 0);
    assert!(env.scratch.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn reversed_order_round_trip() {
    let (assembler, env) = assembler().await;

    let chunks: Vec<Bytes> = (0..5)
        .map(|i| Bytes::from(format!("chunk{};", i)))
        .collect();

    let mut completed = None;
    for index in (0..5).rev() {
        let outcome = assembler
            .submit_chunk("rev", index, 5, chunks[index as usize].clone(), None, None)
            .await
            .unwrap();
        if let SubmitOutcome::Completed(record) = outcome {
            completed = Some(record);
        }
    }

    let record = completed.expect("final submission should complete");
    let merged = env
        .blob_store
        .read(record.storage_path.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(merged, b"chunk0;chunk1;chunk2;chunk3;chunk4;");
}

#[tokio::test]
async fn single_chunk_upload_completes_immediately() {
    let (assembler, env) = assembler().await;

    let outcome = assembler
        .submit_chunk("solo.bin", 0, 1, Bytes::from_static(b"only"), None, None)
        .await
        .unwrap();

    let SubmitOutcome::Completed(record) = outcome else {
        panic!("single-chunk upload should complete on first submission");
    };
    assert_eq!(
        env.blob_store
            .read(record.storage_path.as_deref().unwrap())
            .await
            .unwrap(),
        b"only"
    );
}

#[tokio::test]
async fn resubmitted_index_overwrites_prior_bytes() {
    let (assembler, env) = assembler().await;

    assembler
        .submit_chunk("retry", 0, 2, Bytes::from_static(b"stale"), None, None)
        .await
        .unwrap();
    assembler
        .submit_chunk("retry", 0, 2, Bytes::from_static(b"fresh"), None, None)
        .await
        .unwrap();

    let outcome = assembler
        .submit_chunk("retry", 1, 2, Bytes::from_static(b"-end"), None, None)
        .await
        .unwrap();
    let SubmitOutcome::Completed(record) = outcome else {
        panic!("upload should complete");
    };

    let merged = env
        .blob_store
        .read(record.storage_path.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(merged, b"fresh-end");
}

#[tokio::test]
async fn mismatched_total_is_rejected() {
    let (assembler, _env) = assembler().await;

    assembler
        .submit_chunk("fixed", 0, 3, Bytes::from_static(b"a"), None, None)
        .await
        .unwrap();

    let result = assembler
        .submit_chunk("fixed", 1, 4, Bytes::from_static(b"b"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn first_submission_fixes_total_even_when_out_of_order() {
    let (assembler, env) = assembler().await;

    // A high-index chunk arrives first and fixes the total at 5.
    let outcome = assembler
        .submit_chunk("ooo", 3, 5, Bytes::from_static(b"late"), None, None)
        .await
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Partial { received: 1, .. }));

    let record = env
        .repository
        .find_by_upload_id("ooo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.expected_chunk_count, Some(5));
    assert_eq!(record.status, UploadStatus::Uploading);

    // A later chunk 0 with a different total loses, and the staged chunk
    // set is untouched.
    let result = assembler
        .submit_chunk("ooo", 0, 2, Bytes::from_static(b"early"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(env.scratch.count_chunks("ooo").await.unwrap(), 1);

    // The upload still completes under the fixed total.
    let mut completed = None;
    for index in [0, 1, 2, 4] {
        let outcome = assembler
            .submit_chunk("ooo", index, 5, Bytes::from(format!("{};", index)), None, None)
            .await
            .unwrap();
        if let SubmitOutcome::Completed(record) = outcome {
            completed = Some(record);
        }
    }
    let record = completed.expect("upload should complete under the fixed total");
    let merged = env
        .blob_store
        .read(record.storage_path.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(merged, b"0;1;2;late4;");
}

#[tokio::test]
async fn lock_registry_is_pruned_when_idle() {
    let (assembler, _env) = assembler().await;

    assembler
        .submit_chunk("idle", 0, 2, Bytes::from_static(b"a"), None, None)
        .await
        .unwrap();
    assert_eq!(assembler.active_upload_locks(), 0);

    // Conflict and completion paths release their entries too.
    let result = assembler
        .submit_chunk("idle", 1, 3, Bytes::from_static(b"b"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(assembler.active_upload_locks(), 0);

    assembler
        .submit_chunk("idle", 1, 2, Bytes::from_static(b"b"), None, None)
        .await
        .unwrap();
    assert_eq!(assembler.active_upload_locks(), 0);
}

#[tokio::test]
async fn invalid_parameters_are_rejected() {
    let (assembler, _env) = assembler().await;

    let result = assembler
        .submit_chunk("u", 3, 3, Bytes::from_static(b"x"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    let result = assembler
        .submit_chunk("u", -1, 3, Bytes::from_static(b"x"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    let result = assembler
        .submit_chunk("u", 0, 0, Bytes::from_static(b"x"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    let result = assembler
        .submit_chunk("", 0, 1, Bytes::from_static(b"x"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    let result = assembler
        .submit_chunk("u", 0, MAX_CHUNKS + 1, Bytes::from_static(b"x"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));
}

#[tokio::test]
async fn completed_upload_rejects_further_chunks() {
    let (assembler, _env) = assembler().await;

    assembler
        .submit_chunk("done", 0, 1, Bytes::from_static(b"x"), None, None)
        .await
        .unwrap();

    let result = assembler
        .submit_chunk("done", 0, 1, Bytes::from_static(b"y"), None, None)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn concurrent_final_chunks_merge_exactly_once() {
    let (assembler, env) = assembler().await;
    let assembler = Arc::new(assembler);

    const TOTAL: i32 = 6;
    for index in 0..TOTAL - 2 {
        assembler
            .submit_chunk(
                "race",
                index,
                TOTAL,
                Bytes::from(format!("{};", index)),
                None,
                None,
            )
            .await
            .unwrap();
    }

    let a = assembler.clone();
    let b = assembler.clone();
    let task_a = tokio::spawn(async move {
        a.submit_chunk(
            "race",
            TOTAL - 2,
            TOTAL,
            Bytes::from(format!("{};", TOTAL - 2)),
            None,
            None,
        )
        .await
    });
    let task_b = tokio::spawn(async move {
        b.submit_chunk(
            "race",
            TOTAL - 1,
            TOTAL,
            Bytes::from(format!("{};", TOTAL - 1)),
            None,
            None,
        )
        .await
    });

    let results = vec![
        task_a.await.unwrap().unwrap(),
        task_b.await.unwrap().unwrap(),
    ];

    let completed: Vec<_> = results
        .iter()
        .filter(|r| matches!(r, SubmitOutcome::Completed(_)))
        .collect();
    assert_eq!(completed.len(), 1, "exactly one caller performs the merge");

    let SubmitOutcome::Completed(record) = completed[0] else {
        unreachable!()
    };
    let merged = env
        .blob_store
        .read(record.storage_path.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(merged, b"0;1;2;3;4;5;");

    // The record moved through the claim exactly once.
    let stored = env
        .repository
        .find_by_upload_id("race")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, UploadStatus::Completed);
}
