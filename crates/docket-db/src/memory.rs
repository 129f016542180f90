//! In-memory backend implementing all three repositories.
//!
//! Used by tests and by `STORAGE_BACKEND=memory` local runs. Every operation
//! takes the same async mutex, so the store keeps the Postgres guarantees:
//! one stored file per hash, one job per file, exclusive claims.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use docket_core::{
    new_v7, ClaimedFile, ContentStore, Error, QueueJob, QueueStats, QueueStatus, Resolution,
    Result, StoredFile, UploadCatalog, UploadListing, UploadRecord, UserId, WorkQueue,
};

use crate::content_store::compute_content_hash;

#[derive(Default)]
struct State {
    files: HashMap<Uuid, StoredFile>,
    files_by_hash: HashMap<String, Uuid>,
    uploads: Vec<UploadRecord>,
    /// Jobs in enqueue order.
    jobs: Vec<QueueJob>,
    jobs_by_file: HashMap<Uuid, usize>,
}

impl State {
    fn job_for_file_mut(&mut self, stored_file_id: Uuid) -> Option<&mut QueueJob> {
        let idx = *self.jobs_by_file.get(&stored_file_id)?;
        self.jobs.get_mut(idx)
    }
}

/// In-memory content store, catalog and work queue sharing one state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdate the claim on a file's job. Lets lease-expiry tests run
    /// without waiting out the lease.
    pub async fn backdate_claim(&self, stored_file_id: Uuid, by: Duration) -> Result<()> {
        let by = chrono::Duration::from_std(by)
            .map_err(|e| Error::InvalidInput(format!("Duration out of range: {}", e)))?;
        let mut state = self.state.lock().await;
        let job = state.job_for_file_mut(stored_file_id).ok_or_else(|| {
            Error::NotFound(format!("No queue job for stored file {}", stored_file_id))
        })?;
        job.claimed_at = job.claimed_at.map(|at| at - by);
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn resolve(&self, content: &[u8], original_name: &str) -> Result<Resolution> {
        let content_hash = compute_content_hash(content);
        let mut state = self.state.lock().await;

        if let Some(id) = state.files_by_hash.get(&content_hash) {
            return Ok(Resolution {
                stored_file_id: *id,
                content_hash,
                is_new: false,
            });
        }

        let id = new_v7();
        state.files.insert(
            id,
            StoredFile {
                id,
                content_hash: content_hash.clone(),
                content: content.to_vec(),
                original_name: original_name.to_string(),
                size_bytes: content.len() as i64,
                created_at: Utc::now(),
            },
        );
        state.files_by_hash.insert(content_hash.clone(), id);

        debug!(
            subsystem = "db",
            component = "memory",
            op = "resolve",
            stored_file_id = %id,
            content_hash = %content_hash,
            "Stored new file in memory"
        );
        Ok(Resolution {
            stored_file_id: id,
            content_hash,
            is_new: true,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredFile>> {
        Ok(self.state.lock().await.files.get(&id).cloned())
    }

    async fn get_by_hash(&self, content_hash: &str) -> Result<Option<StoredFile>> {
        let state = self.state.lock().await;
        Ok(state
            .files_by_hash
            .get(content_hash)
            .and_then(|id| state.files.get(id))
            .cloned())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.state.lock().await.files.len() as i64)
    }
}

#[async_trait]
impl UploadCatalog for MemoryStore {
    async fn record_upload(
        &self,
        user_id: UserId,
        stored_file_id: Uuid,
        display_name: &str,
    ) -> Result<Uuid> {
        let mut state = self.state.lock().await;
        if !state.files.contains_key(&stored_file_id) {
            return Err(Error::NotFound(format!(
                "Stored file {} not found",
                stored_file_id
            )));
        }

        let id = new_v7();
        state.uploads.push(UploadRecord {
            id,
            user_id,
            stored_file_id,
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_uploads(&self, user_id: UserId) -> Result<Vec<UploadListing>> {
        let state = self.state.lock().await;
        let mut listings = Vec::new();

        for upload in state.uploads.iter().filter(|u| u.user_id == user_id) {
            let file = state.files.get(&upload.stored_file_id).ok_or_else(|| {
                Error::Internal(format!(
                    "Upload {} references missing file {}",
                    upload.id, upload.stored_file_id
                ))
            })?;
            let job = state
                .jobs_by_file
                .get(&upload.stored_file_id)
                .and_then(|idx| state.jobs.get(*idx));

            listings.push(UploadListing {
                original_name: upload.display_name.clone(),
                upload_date: upload.created_at,
                file_content_hash: file.content_hash.clone(),
                queue_status: job.map(|j| j.status),
                queue_updated_at: job.map(|j| j.updated_at),
            });
        }
        Ok(listings)
    }

    async fn count_for_file(&self, stored_file_id: Uuid) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .uploads
            .iter()
            .filter(|u| u.stored_file_id == stored_file_id)
            .count() as i64)
    }
}

#[async_trait]
impl WorkQueue for MemoryStore {
    async fn enqueue(&self, stored_file_id: Uuid) -> Result<Uuid> {
        let mut state = self.state.lock().await;
        if !state.files.contains_key(&stored_file_id) {
            return Err(Error::NotFound(format!(
                "Stored file {} not found",
                stored_file_id
            )));
        }
        if let Some(job) = state.job_for_file_mut(stored_file_id) {
            return Ok(job.id);
        }

        let now = Utc::now();
        let id = new_v7();
        state.jobs.push(QueueJob {
            id,
            stored_file_id,
            status: QueueStatus::Queued,
            result: None,
            claimed_by: None,
            claimed_at: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        });
        let idx = state.jobs.len() - 1;
        state.jobs_by_file.insert(stored_file_id, idx);

        info!(
            subsystem = "queue",
            component = "memory",
            op = "enqueue",
            job_id = %id,
            stored_file_id = %stored_file_id,
            "Parse job queued"
        );
        Ok(id)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedFile>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.status == QueueStatus::Queued)
        else {
            return Ok(None);
        };
        job.status = QueueStatus::InProgress;
        job.claimed_by = Some(worker_id.to_string());
        job.claimed_at = Some(now);
        job.attempts += 1;
        job.updated_at = now;
        let (job_id, stored_file_id) = (job.id, job.stored_file_id);

        let file = state.files.get(&stored_file_id).ok_or_else(|| {
            Error::Internal(format!(
                "Job {} references missing file {}",
                job_id, stored_file_id
            ))
        })?;

        Ok(Some(ClaimedFile {
            job_id,
            stored_file_id,
            content_hash: file.content_hash.clone(),
            content: file.content.clone(),
            original_name: file.original_name.clone(),
        }))
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

        let mut state = self.state.lock().await;
        let job = state.job_for_file_mut(stored_file_id).ok_or_else(|| {
            Error::NotFound(format!("No queue job for stored file {}", stored_file_id))
        })?;

        let previous = job.status;
        job.status = status;
        job.result = result;
        job.updated_at = Utc::now();

        if previous.is_terminal() {
            warn!(
                subsystem = "queue",
                component = "memory",
                op = "record_completion",
                stored_file_id = %stored_file_id,
                previous = %previous,
                status = %status,
                "Overwriting terminal status of parse job"
            );
        }
        Ok(previous)
    }

    async fn requeue_expired(&self, lease: Duration) -> Result<u64> {
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| Error::InvalidInput(format!("Lease out of range: {}", e)))?;
        let now = Utc::now();
        let cutoff = now - lease;

        let mut state = self.state.lock().await;
        let mut requeued = 0;
        for job in state.jobs.iter_mut().filter(|j| {
            j.status == QueueStatus::InProgress && j.claimed_at.is_some_and(|at| at <= cutoff)
        }) {
            job.status = QueueStatus::Queued;
            job.claimed_by = None;
            job.claimed_at = None;
            job.updated_at = now;
            requeued += 1;
        }
        Ok(requeued)
    }

    async fn get_for_file(&self, stored_file_id: Uuid) -> Result<Option<QueueJob>> {
        let state = self.state.lock().await;
        Ok(state
            .jobs_by_file
            .get(&stored_file_id)
            .and_then(|idx| state.jobs.get(*idx))
            .cloned())
    }

    async fn stats(&self) -> Result<QueueStats> {
        let state = self.state.lock().await;
        let mut stats = QueueStats::default();
        for job in &state.jobs {
            match job.status {
                QueueStatus::Queued => stats.queued += 1,
                QueueStatus::InProgress => stats.in_progress += 1,
                QueueStatus::Parsed => stats.parsed += 1,
                QueueStatus::Failed => stats.failed += 1,
            }
            stats.total += 1;
        }
        Ok(stats)
    }
}
