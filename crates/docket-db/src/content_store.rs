//! Content-addressed file storage with SHA-256 deduplication.
//!
//! Each distinct byte sequence is stored once in `stored_file`, keyed by the
//! lowercase hex SHA-256 of its bytes. Resolution is a single upsert, so two
//! uploads racing on the same bytes never both observe `is_new = true`.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use docket_core::{new_v7, ContentStore, Error, Resolution, Result, StoredFile};

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Name of the unique constraint on `stored_file.content_hash`.
const CONTENT_HASH_CONSTRAINT: &str = "stored_file_content_hash_key";

/// Compute the lowercase hex SHA-256 of `data`.
pub fn compute_content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// True when `err` is a unique violation on the content hash.
fn is_content_hash_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(CONTENT_HASH_CONSTRAINT)
        }
        _ => false,
    }
}

/// PostgreSQL implementation of ContentStore.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    /// Create a new PgContentStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_stored_file_row(row: sqlx::postgres::PgRow) -> StoredFile {
        StoredFile {
            id: row.get("id"),
            content_hash: row.get("content_hash"),
            content: row.get("content"),
            original_name: row.get("original_name"),
            size_bytes: row.get("size_bytes"),
            created_at: row.get("created_at"),
        }
    }

    async fn find_id_by_hash(&self, content_hash: &str) -> Result<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM stored_file WHERE content_hash = $1")
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    /// Insert-or-find inside one transaction. `Ok(None)` means a concurrent
    /// writer won a conflict the upsert could not absorb.
    async fn upsert(
        &self,
        content: &[u8],
        content_hash: &str,
        original_name: &str,
    ) -> std::result::Result<Option<(Uuid, bool)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO stored_file (id, content_hash, content, original_name, size_bytes, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (content_hash) DO NOTHING
             RETURNING id",
        )
        .bind(new_v7())
        .bind(content_hash)
        .bind(content)
        .bind(original_name)
        .bind(content.len() as i64)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let resolved = match inserted {
            Some(id) => Some((id, true)),
            None => {
                sqlx::query_scalar::<_, Uuid>("SELECT id FROM stored_file WHERE content_hash = $1")
                    .bind(content_hash)
                    .fetch_optional(&mut *tx)
                    .await?
                    .map(|id| (id, false))
            }
        };

        tx.commit().await?;
        Ok(resolved)
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn resolve(&self, content: &[u8], original_name: &str) -> Result<Resolution> {
        let start = Instant::now();
        let content_hash = compute_content_hash(content);

        let resolved = match self.upsert(content, &content_hash, original_name).await {
            Ok(resolved) => resolved,
            Err(e) if is_content_hash_conflict(&e) => {
                debug!(
                    subsystem = "db",
                    component = "content_store",
                    op = "resolve",
                    content_hash = %content_hash,
                    "Lost insert race, resolving to existing row"
                );
                None
            }
            Err(e) => {
                warn!(
                    subsystem = "db",
                    component = "content_store",
                    op = "resolve",
                    content_hash = %content_hash,
                    error = %e,
                    "Stored file upsert failed"
                );
                return Err(Error::StorageFault(format!(
                    "Failed to store file {}: {}",
                    content_hash, e
                )));
            }
        };

        let (stored_file_id, is_new) = match resolved {
            Some(found) => found,
            None => {
                let id = self.find_id_by_hash(&content_hash).await?.ok_or_else(|| {
                    Error::StorageFault(format!(
                        "Stored file {} vanished after conflict",
                        content_hash
                    ))
                })?;
                (id, false)
            }
        };

        info!(
            subsystem = "db",
            component = "content_store",
            op = "resolve",
            stored_file_id = %stored_file_id,
            content_hash = %content_hash,
            is_new,
            size_bytes = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Content resolved"
        );

        Ok(Resolution {
            stored_file_id,
            content_hash,
            is_new,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredFile>> {
        let row = sqlx::query(
            "SELECT id, content_hash, content, original_name, size_bytes, created_at
             FROM stored_file WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_stored_file_row))
    }

    async fn get_by_hash(&self, content_hash: &str) -> Result<Option<StoredFile>> {
        let row = sqlx::query(
            "SELECT id, content_hash, content, original_name, size_bytes, created_at
             FROM stored_file WHERE content_hash = $1",
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_stored_file_row))
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stored_file")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}
