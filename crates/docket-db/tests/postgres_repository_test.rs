//! Integration tests for the PostgreSQL repositories.
//!
//! Run with a migrated database:
//! `DATABASE_URL=postgres://... cargo test -p docket-db -- --ignored`

use std::collections::HashSet;

use docket_db::test_fixtures::{connect_migrated, unique_pdf_bytes};
use docket_db::{
    compute_content_hash, ContentStore, QueueStatus, UploadCatalog, UserId, WorkQueue,
};
use uuid::Uuid;

async fn setup() -> docket_db::Database {
    dotenvy::dotenv().ok();
    connect_migrated().await.expect("connect to test database")
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_resolve_is_idempotent_per_hash() {
    let db = setup().await;
    let bytes = unique_pdf_bytes("resolve");

    let first = db.files.resolve(&bytes, "first.pdf").await.unwrap();
    let second = db.files.resolve(&bytes, "second.pdf").await.unwrap();

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(first.stored_file_id, second.stored_file_id);
    assert_eq!(first.content_hash, compute_content_hash(&bytes));

    let stored = db.files.get(first.stored_file_id).await.unwrap().unwrap();
    assert_eq!(stored.original_name, "first.pdf");
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_get_by_hash_round_trips_bytes() {
    let db = setup().await;
    let mut bytes = unique_pdf_bytes("binary");
    bytes.extend_from_slice(&[0x00, 0xff, 0x10, 0x80]);

    let res = db.files.resolve(&bytes, "bin.pdf").await.unwrap();
    let stored = db.files.get_by_hash(&res.content_hash).await.unwrap().unwrap();

    assert_eq!(stored.content, bytes);
    assert_eq!(stored.size_bytes, bytes.len() as i64);
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_concurrent_resolve_has_single_winner() {
    let db = setup().await;
    let bytes = unique_pdf_bytes("race");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = db.files.clone();
            let bytes = bytes.clone();
            tokio::spawn(async move { store.resolve(&bytes, &format!("{}.pdf", i)).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_new).count(), 1);
    let ids: HashSet<_> = results.iter().map(|r| r.stored_file_id).collect();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_listing_left_joins_queue() {
    let db = setup().await;
    let user = UserId(Uuid::now_v7().as_u128() as i64 & i64::MAX);

    let with_job = db
        .files
        .resolve(&unique_pdf_bytes("listed-job"), "job.pdf")
        .await
        .unwrap();
    let without_job = db
        .files
        .resolve(&unique_pdf_bytes("listed-nojob"), "nojob.pdf")
        .await
        .unwrap();
    db.jobs.enqueue(with_job.stored_file_id).await.unwrap();

    db.uploads
        .record_upload(user, with_job.stored_file_id, "a.pdf")
        .await
        .unwrap();
    db.uploads
        .record_upload(user, without_job.stored_file_id, "b.pdf")
        .await
        .unwrap();

    let listing = db.uploads.list_uploads(user).await.unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].original_name, "a.pdf");
    assert_eq!(listing[0].queue_status, Some(QueueStatus::Queued));
    assert!(listing[0].queue_updated_at.is_some());
    assert_eq!(listing[1].original_name, "b.pdf");
    assert!(listing[1].queue_status.is_none());
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_enqueue_is_idempotent_and_checks_file() {
    let db = setup().await;
    let res = db
        .files
        .resolve(&unique_pdf_bytes("enqueue"), "e.pdf")
        .await
        .unwrap();

    let a = db.jobs.enqueue(res.stored_file_id).await.unwrap();
    let b = db.jobs.enqueue(res.stored_file_id).await.unwrap();
    assert_eq!(a, b);

    let missing = db.jobs.enqueue(Uuid::now_v7()).await;
    assert!(matches!(missing, Err(docket_db::Error::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_record_completion_unknown_file_is_not_found() {
    let db = setup().await;
    let err = db
        .jobs
        .record_completion(Uuid::now_v7(), QueueStatus::Parsed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, docket_db::Error::NotFound(_)));
}
