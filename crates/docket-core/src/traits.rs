//! Repository traits for the ingestion pipeline.
//!
//! The three repositories are deliberately narrow: services compose them and
//! own the ordering between store, catalog and queue writes.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ClaimedFile, QueueJob, QueueStats, QueueStatus, Resolution, StoredFile, UploadListing, UserId,
};

// =============================================================================
// CONTENT STORE
// =============================================================================

/// Content-addressed file storage and deduplication authority.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Resolve bytes to a stored file, inserting it on first sight.
    ///
    /// Exactly one caller observes `is_new = true` per distinct hash, even
    /// when several resolve the same bytes concurrently.
    async fn resolve(&self, content: &[u8], original_name: &str) -> Result<Resolution>;

    /// Get a stored file by id.
    async fn get(&self, id: Uuid) -> Result<Option<StoredFile>>;

    /// Get a stored file by content hash.
    async fn get_by_hash(&self, content_hash: &str) -> Result<Option<StoredFile>>;

    /// Number of distinct stored files.
    async fn count(&self) -> Result<i64>;
}

// =============================================================================
// UPLOAD CATALOG
// =============================================================================

/// Per-user upload records referencing stored files.
#[async_trait]
pub trait UploadCatalog: Send + Sync {
    /// Record one upload event. Never deduplicates.
    async fn record_upload(
        &self,
        user_id: UserId,
        stored_file_id: Uuid,
        display_name: &str,
    ) -> Result<Uuid>;

    /// List a user's uploads with the queue state of the referenced file.
    async fn list_uploads(&self, user_id: UserId) -> Result<Vec<UploadListing>>;

    /// Number of upload records pointing at a stored file.
    async fn count_for_file(&self, stored_file_id: Uuid) -> Result<i64>;
}

// =============================================================================
// WORK QUEUE
// =============================================================================

/// Parse-job queue with leased claims.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Queue a job for a stored file.
    ///
    /// Idempotent per file: a second call returns the existing job id.
    async fn enqueue(&self, stored_file_id: Uuid) -> Result<Uuid>;

    /// Claim the oldest queued job, moving it to `in_progress` under a lease
    /// held by `worker_id`. Returns `None` when nothing is queued.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedFile>>;

    /// Record a terminal status for the file's job.
    ///
    /// Returns the status the job had before this call. Fails with
    /// `Error::NotFound` when the file has no job and `Error::InvalidInput`
    /// when `status` is not terminal.
    async fn record_completion(
        &self,
        stored_file_id: Uuid,
        status: QueueStatus,
        result: Option<JsonValue>,
    ) -> Result<QueueStatus>;

    /// Return claims older than `lease` to the queue. Returns how many moved.
    async fn requeue_expired(&self, lease: Duration) -> Result<u64>;

    /// Get the job for a stored file.
    async fn get_for_file(&self, stored_file_id: Uuid) -> Result<Option<QueueJob>>;

    /// Counts per status.
    async fn stats(&self) -> Result<QueueStats>;
}
