//! Claim/complete protocol consumed by parse workers.
//!
//! The HTTP handlers and the embedded worker share one [`WorkerProtocol`];
//! [`InProcessSource`] adapts it to the worker's [`WorkSource`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use docket_core::{ParseReport, QueueStatus, Result, WorkQueue};
use docket_jobs::{FetchOutcome, WorkItem, WorkSource};

/// Pull-based claim/complete interface over the work queue.
pub struct WorkerProtocol {
    jobs: Arc<dyn WorkQueue>,
}

impl WorkerProtocol {
    pub fn new(jobs: Arc<dyn WorkQueue>) -> Self {
        Self { jobs }
    }

    /// Claim the oldest queued file for `worker_id`.
    ///
    /// An empty queue is [`FetchOutcome::Empty`], not an error.
    pub async fn fetch_next(&self, worker_id: &str) -> Result<FetchOutcome> {
        match self.jobs.claim_next(worker_id).await? {
            Some(claimed) => Ok(FetchOutcome::Work(WorkItem::from(claimed))),
            None => {
                debug!(subsystem = "protocol", worker_id, "No queued files");
                Ok(FetchOutcome::Empty)
            }
        }
    }

    /// Record a worker's terminal status. Returns the job's previous status.
    pub async fn report_result(&self, report: &ParseReport) -> Result<QueueStatus> {
        let previous = self
            .jobs
            .record_completion(report.file_id, report.status, report.result.clone())
            .await?;

        info!(
            subsystem = "protocol",
            op = "report_result",
            stored_file_id = %report.file_id,
            status = %report.status,
            previous = %previous,
            "Parse result recorded"
        );
        Ok(previous)
    }
}

/// [`WorkSource`] backed directly by a [`WorkerProtocol`], for running the
/// parse worker inside the API process.
pub struct InProcessSource {
    protocol: Arc<WorkerProtocol>,
    worker_id: String,
}

impl InProcessSource {
    pub fn new(protocol: Arc<WorkerProtocol>, worker_id: impl Into<String>) -> Self {
        Self {
            protocol,
            worker_id: worker_id.into(),
        }
    }
}

#[async_trait]
impl WorkSource for InProcessSource {
    async fn fetch_next(&self) -> Result<FetchOutcome> {
        self.protocol.fetch_next(&self.worker_id).await
    }

    async fn report_result(&self, report: &ParseReport) -> Result<()> {
        self.protocol.report_result(report).await.map(|_| ())
    }
}
