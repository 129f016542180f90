//! Upload catalog repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use docket_core::{new_v7, Error, QueueStatus, Result, UploadCatalog, UploadListing, UserId};

/// SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL implementation of UploadCatalog.
#[derive(Clone)]
pub struct PgUploadCatalog {
    pool: PgPool,
}

impl PgUploadCatalog {
    /// Create a new PgUploadCatalog with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_listing_row(row: sqlx::postgres::PgRow) -> Result<UploadListing> {
        let queue_status = row
            .get::<Option<String>, _>("queue_status")
            .map(|s| s.parse::<QueueStatus>())
            .transpose()?;

        Ok(UploadListing {
            original_name: row.get("display_name"),
            upload_date: row.get("created_at"),
            file_content_hash: row.get("content_hash"),
            queue_status,
            queue_updated_at: row.get("queue_updated_at"),
        })
    }
}

#[async_trait]
impl UploadCatalog for PgUploadCatalog {
    async fn record_upload(
        &self,
        user_id: UserId,
        stored_file_id: Uuid,
        display_name: &str,
    ) -> Result<Uuid> {
        let upload_id = new_v7();

        sqlx::query(
            "INSERT INTO upload_record (id, user_id, stored_file_id, display_name, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(upload_id)
        .bind(user_id.0)
        .bind(stored_file_id)
        .bind(display_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
            {
                Error::NotFound(format!("Stored file {} not found", stored_file_id))
            }
            _ => Error::Database(e),
        })?;

        debug!(
            subsystem = "db",
            component = "catalog",
            op = "record_upload",
            upload_id = %upload_id,
            user_id = user_id.0,
            stored_file_id = %stored_file_id,
            "Upload recorded"
        );
        Ok(upload_id)
    }

    async fn list_uploads(&self, user_id: UserId) -> Result<Vec<UploadListing>> {
        let rows = sqlx::query(
            "SELECT u.display_name, u.created_at, f.content_hash,
                    q.status::text AS queue_status, q.updated_at AS queue_updated_at
             FROM upload_record u
             JOIN stored_file f ON f.id = u.stored_file_id
             LEFT JOIN queue_job q ON q.stored_file_id = u.stored_file_id
             WHERE u.user_id = $1
             ORDER BY u.created_at ASC, u.id ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_listing_row).collect()
    }

    async fn count_for_file(&self, stored_file_id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM upload_record WHERE stored_file_id = $1")
            .bind(stored_file_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}
