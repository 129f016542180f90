//! Where the worker gets its work from.
//!
//! [`HttpWorkSource`] talks to the API's `/parse` and `/parse-result`
//! endpoints. The API crate also implements [`WorkSource`] in-process for the
//! embedded worker.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use tracing::debug;
use uuid::Uuid;

use docket_core::defaults;
use docket_core::{ClaimedFile, Error, ParseReport, ParseTask, Result};

/// A claimed file, decoded and ready to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub file_id: Uuid,
    pub hash: String,
    pub name: String,
    pub content: Vec<u8>,
}

impl From<ClaimedFile> for WorkItem {
    fn from(file: ClaimedFile) -> Self {
        Self {
            file_id: file.stored_file_id,
            hash: file.content_hash,
            name: file.original_name,
            content: file.content,
        }
    }
}

impl TryFrom<ParseTask> for WorkItem {
    type Error = Error;

    fn try_from(task: ParseTask) -> Result<Self> {
        let content = task.decode_content()?;
        Ok(Self {
            file_id: task.file_id,
            hash: task.hash,
            name: task.name,
            content,
        })
    }
}

impl From<WorkItem> for ParseTask {
    fn from(item: WorkItem) -> Self {
        Self {
            file_id: item.file_id,
            content: base64::engine::general_purpose::STANDARD.encode(&item.content),
            hash: item.hash,
            name: item.name,
        }
    }
}

/// Result of asking for work. An empty queue is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Work(WorkItem),
    Empty,
}

/// Pull-based claim/complete interface the worker polls.
#[async_trait]
pub trait WorkSource: Send + Sync {
    /// Claim the next queued file.
    async fn fetch_next(&self) -> Result<FetchOutcome>;

    /// Report a terminal status for a file.
    async fn report_result(&self, report: &ParseReport) -> Result<()>;
}

/// HTTP client for the API's worker endpoints.
pub struct HttpWorkSource {
    client: Client,
    base_url: String,
    worker_id: String,
}

impl HttpWorkSource {
    /// Create a client for `base_url` identifying itself as `worker_id`.
    pub fn new(base_url: impl Into<String>, worker_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::WORKER_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            worker_id: worker_id.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl WorkSource for HttpWorkSource {
    async fn fetch_next(&self) -> Result<FetchOutcome> {
        let response = self
            .client
            .get(self.url("/parse"))
            .header(defaults::WORKER_ID_HEADER, &self.worker_id)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Fetch failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(subsystem = "worker", op = "fetch_next", "No work available");
            return Ok(FetchOutcome::Empty);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "GET /parse returned {}: {}",
                status, body
            )));
        }

        let task: ParseTask = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse task: {}", e)))?;

        Ok(FetchOutcome::Work(WorkItem::try_from(task)?))
    }

    async fn report_result(&self, report: &ParseReport) -> Result<()> {
        let response = self
            .client
            .post(self.url("/parse-result"))
            .header(defaults::WORKER_ID_HEADER, &self.worker_id)
            .json(report)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Report failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!(
                "No queue job for file {}: {}",
                report.file_id, body
            )));
        }
        Err(Error::Request(format!(
            "POST /parse-result returned {}: {}",
            status, body
        )))
    }
}
