//! Parse-job queue repository implementation.
//!
//! One `queue_job` row per stored file. Claims move a job to `in_progress`
//! under a lease (`claimed_by`, `claimed_at`); the sweep returns expired
//! leases to `queued`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use docket_core::{
    new_v7, ClaimedFile, Error, QueueJob, QueueStats, QueueStatus, Result, WorkQueue,
};

/// SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL implementation of WorkQueue.
#[derive(Clone)]
pub struct PgWorkQueue {
    pool: PgPool,
}

impl PgWorkQueue {
    /// Create a new PgWorkQueue with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn str_to_status(s: &str) -> Result<QueueStatus> {
        s.parse::<QueueStatus>()
            .map_err(|_| Error::Internal(format!("Unexpected queue status in database: {}", s)))
    }

    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<QueueJob> {
        Ok(QueueJob {
            id: row.get("id"),
            stored_file_id: row.get("stored_file_id"),
            status: Self::str_to_status(row.get("status"))?,
            result: row.get("result"),
            claimed_by: row.get("claimed_by"),
            claimed_at: row.get("claimed_at"),
            attempts: row.get("attempts"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    async fn enqueue(&self, stored_file_id: Uuid) -> Result<Uuid> {
        let now = Utc::now();

        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO queue_job (id, stored_file_id, status, attempts, created_at, updated_at)
             VALUES ($1, $2, 'queued'::queue_status, 0, $3, $3)
             ON CONFLICT (stored_file_id) DO NOTHING
             RETURNING id",
        )
        .bind(new_v7())
        .bind(stored_file_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
            {
                Error::NotFound(format!("Stored file {} not found", stored_file_id))
            }
            _ => Error::Database(e),
        })?;

        if let Some(job_id) = inserted {
            info!(
                subsystem = "queue",
                component = "work_queue",
                op = "enqueue",
                job_id = %job_id,
                stored_file_id = %stored_file_id,
                "Parse job queued"
            );
            return Ok(job_id);
        }

        let existing =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM queue_job WHERE stored_file_id = $1")
                .bind(stored_file_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;

        debug!(
            subsystem = "queue",
            component = "work_queue",
            op = "enqueue",
            job_id = %existing,
            stored_file_id = %stored_file_id,
            "Job already exists for stored file"
        );
        Ok(existing)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedFile>> {
        let now = Utc::now();

        // SKIP LOCKED keeps concurrent claimers off each other's rows.
        let row = sqlx::query(
            "WITH claimed AS (
                 UPDATE queue_job
                 SET status = 'in_progress'::queue_status, claimed_by = $1, claimed_at = $2,
                     attempts = attempts + 1, updated_at = $2
                 WHERE id = (
                     SELECT id FROM queue_job
                     WHERE status = 'queued'::queue_status
                     ORDER BY created_at ASC, id ASC
                     LIMIT 1
                     FOR UPDATE SKIP LOCKED
                 )
                 RETURNING id, stored_file_id
             )
             SELECT c.id AS job_id, f.id AS stored_file_id, f.content_hash, f.content,
                    f.original_name
             FROM claimed c
             JOIN stored_file f ON f.id = c.stored_file_id",
        )
        .bind(worker_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let claimed = row.map(|row| ClaimedFile {
            job_id: row.get("job_id"),
            stored_file_id: row.get("stored_file_id"),
            content_hash: row.get("content_hash"),
            content: row.get("content"),
            original_name: row.get("original_name"),
        });

        if let Some(ref file) = claimed {
            info!(
                subsystem = "queue",
                component = "work_queue",
                op = "claim_next",
                job_id = %file.job_id,
                stored_file_id = %file.stored_file_id,
                worker_id = %worker_id,
                "Parse job claimed"
            );
        }
        Ok(claimed)
    }

    async fn record_completion(
        &self,
        stored_file_id: Uuid,
        status: QueueStatus,
        result: Option<JsonValue>,
    ) -> Result<QueueStatus> {
        if !status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "Completion status must be parsed or failed, got {}",
                status
            )));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT status::text FROM queue_job WHERE stored_file_id = $1 FOR UPDATE",
        )
        .bind(stored_file_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let previous = match previous {
            Some(s) => Self::str_to_status(&s)?,
            None => {
                return Err(Error::NotFound(format!(
                    "No queue job for stored file {}",
                    stored_file_id
                )))
            }
        };

        sqlx::query(
            "UPDATE queue_job
             SET status = $1::queue_status, result = $2, updated_at = $3
             WHERE stored_file_id = $4",
        )
        .bind(status.as_str())
        .bind(&result)
        .bind(Utc::now())
        .bind(stored_file_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        if previous.is_terminal() {
            warn!(
                subsystem = "queue",
                component = "work_queue",
                op = "record_completion",
                stored_file_id = %stored_file_id,
                previous = %previous,
                status = %status,
                "Overwriting terminal status of parse job"
            );
        } else {
            info!(
                subsystem = "queue",
                component = "work_queue",
                op = "record_completion",
                stored_file_id = %stored_file_id,
                previous = %previous,
                status = %status,
                "Parse job completed"
            );
        }
        Ok(previous)
    }

    async fn requeue_expired(&self, lease: Duration) -> Result<u64> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| Error::InvalidInput(format!("Lease out of range: {}", e)))?;
        let cutoff = now - lease;

        let requeued = sqlx::query(
            "UPDATE queue_job
             SET status = 'queued'::queue_status, claimed_by = NULL, claimed_at = NULL,
                 updated_at = $2
             WHERE status = 'in_progress'::queue_status AND claimed_at <= $1",
        )
        .bind(cutoff)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        if requeued > 0 {
            warn!(
                subsystem = "queue",
                component = "work_queue",
                op = "requeue_expired",
                requeued,
                lease_secs = lease.num_seconds(),
                "Requeued parse jobs with expired leases"
            );
        }
        Ok(requeued)
    }

    async fn get_for_file(&self, stored_file_id: Uuid) -> Result<Option<QueueJob>> {
        let row = sqlx::query(
            "SELECT id, stored_file_id, status::text AS status, result, claimed_by, claimed_at,
                    attempts, created_at, updated_at
             FROM queue_job WHERE stored_file_id = $1",
        )
        .bind(stored_file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'queued') AS queued,
                COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress,
                COUNT(*) FILTER (WHERE status = 'parsed') AS parsed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) AS total
             FROM queue_job",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            queued: row.get::<i64, _>("queued"),
            in_progress: row.get::<i64, _>("in_progress"),
            parsed: row.get::<i64, _>("parsed"),
            failed: row.get::<i64, _>("failed"),
            total: row.get::<i64, _>("total"),
        })
    }
}
