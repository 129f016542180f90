//! Claim and lease lifecycle against PostgreSQL.
//!
//! Kept to a single test in its own binary: it drains the shared queue, which
//! would race with tests that leave jobs queued.

use std::time::Duration;

use docket_db::test_fixtures::{connect_migrated, unique_pdf_bytes};
use docket_db::{ContentStore, Database, QueueStatus, WorkQueue};
use serde_json::json;
use uuid::Uuid;

/// Claim until our file comes up, failing leftovers from earlier runs.
async fn claim_file(db: &Database, stored_file_id: Uuid, worker: &str) -> bool {
    while let Some(claimed) = db.jobs.claim_next(worker).await.unwrap() {
        if claimed.stored_file_id == stored_file_id {
            return true;
        }
        db.jobs
            .record_completion(claimed.stored_file_id, QueueStatus::Failed, None)
            .await
            .unwrap();
    }
    false
}

async fn setup() -> docket_db::Database {
    dotenvy::dotenv().ok();
    connect_migrated().await.expect("connect to test database")
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_claim_lease_requeue_and_completion() {
    let db = setup().await;
    let res = db
        .files
        .resolve(&unique_pdf_bytes("lease"), "lease.pdf")
        .await
        .unwrap();
    db.jobs.enqueue(res.stored_file_id).await.unwrap();

    // Claim stamps the lease.
    assert!(claim_file(&db, res.stored_file_id, "crashed-worker").await);
    let job = db
        .jobs
        .get_for_file(res.stored_file_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, QueueStatus::InProgress);
    assert_eq!(job.claimed_by.as_deref(), Some("crashed-worker"));
    assert!(job.claimed_at.is_some());
    assert_eq!(job.attempts, 1);

    // A live lease keeps the job away from other workers.
    assert_eq!(
        db.jobs
            .requeue_expired(Duration::from_secs(300))
            .await
            .unwrap(),
        0
    );
    assert!(db.jobs.claim_next("other").await.unwrap().is_none());

    // Expire the lease and sweep.
    sqlx::query(
        "UPDATE queue_job SET claimed_at = claimed_at - INTERVAL '1 hour' WHERE stored_file_id = $1",
    )
    .bind(res.stored_file_id)
    .execute(db.pool())
    .await
    .unwrap();
    assert_eq!(
        db.jobs
            .requeue_expired(Duration::from_secs(300))
            .await
            .unwrap(),
        1
    );
    let job = db
        .jobs
        .get_for_file(res.stored_file_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, QueueStatus::Queued);
    assert!(job.claimed_by.is_none());

    // Second claim, then completion with last-write-wins.
    assert!(claim_file(&db, res.stored_file_id, "healthy-worker").await);
    let job = db
        .jobs
        .get_for_file(res.stored_file_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.attempts, 2);

    let prev = db
        .jobs
        .record_completion(
            res.stored_file_id,
            QueueStatus::Parsed,
            Some(json!({"parsed_content": "x"})),
        )
        .await
        .unwrap();
    assert_eq!(prev, QueueStatus::InProgress);

    let prev = db
        .jobs
        .record_completion(res.stored_file_id, QueueStatus::Failed, None)
        .await
        .unwrap();
    assert_eq!(prev, QueueStatus::Parsed);

    let stats = db.jobs.stats().await.unwrap();
    assert_eq!(stats.in_progress, 0);
    assert!(stats.failed >= 1);
}
