//! Parse worker: polls a work source, parses, reports.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use docket_core::defaults;
use docket_core::{new_v7, Error, ParseReport, QueueStatus, Result};

use crate::parser::{DocumentParser, ParseOutcome};
use crate::source::{FetchOutcome, WorkItem, WorkSource};

/// Configuration for the parse worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the docket API.
    pub api_url: String,
    /// Sleep between polls when the queue is empty or a call failed.
    ///
    /// The interval only applies in those two cases. After a successful
    /// report the worker polls again at once, so a backlog drains without
    /// waiting between files.
    pub poll_interval_ms: u64,
    /// Identity sent with every claim.
    pub worker_id: String,
    /// Upper bound on a single parse.
    pub parse_timeout_secs: u64,
    /// Whether to run the loop at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::WORKER_API_URL.to_string(),
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            worker_id: format!("worker-{}", new_v7()),
            parse_timeout_secs: defaults::WORKER_PARSE_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DOCKET_API_URL` | `http://127.0.0.1:3000` | API base URL |
    /// | `WORKER_POLL_INTERVAL_MS` | `20000` | Sleep when idle or after a failed call |
    /// | `WORKER_ID` | `worker-<uuid>` | Claimant identity |
    /// | `WORKER_PARSE_TIMEOUT_SECS` | `120` | Parse timeout |
    /// | `WORKER_ENABLED` | `true` | Enable/disable the loop |
    pub fn from_env() -> Self {
        let base = Self::default();

        let api_url = std::env::var("DOCKET_API_URL").unwrap_or(base.api_url);

        let poll_interval_ms = std::env::var("WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(base.poll_interval_ms);

        let worker_id = std::env::var("WORKER_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(base.worker_id);

        let parse_timeout_secs = std::env::var("WORKER_PARSE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(base.parse_timeout_secs)
            .max(1);

        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            api_url,
            poll_interval_ms,
            worker_id,
            parse_timeout_secs,
            enabled,
        }
    }

    /// Set the API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the worker identity.
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Set the parse timeout.
    pub fn with_parse_timeout(mut self, secs: u64) -> Self {
        self.parse_timeout_secs = secs;
        self
    }

    /// Enable or disable the loop.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the parse worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Worker started.
    WorkerStarted,
    /// A file was claimed.
    JobFetched { file_id: Uuid },
    /// A result was accepted by the source.
    JobReported { file_id: Uuid, status: QueueStatus },
    /// Fetching work failed.
    FetchFailed { error: String },
    /// Reporting a result failed.
    ReportFailed { file_id: Uuid, error: String },
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Wait for the worker loop to exit.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Worker task failed: {}", e)))
    }
}

/// Polls a [`WorkSource`], parses claimed files and reports the outcome.
pub struct ParseWorker {
    source: Arc<dyn WorkSource>,
    parser: Arc<dyn DocumentParser>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl ParseWorker {
    /// Create a new parse worker.
    pub fn new(
        source: Arc<dyn WorkSource>,
        parser: Arc<dyn DocumentParser>,
        config: WorkerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::WORKER_EVENT_CAPACITY);
        Self {
            source,
            parser,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events. Subscribe before `start` to see
    /// `WorkerStarted`.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    /// Run the poll loop until shutdown.
    ///
    /// Claims one file at a time. Sleeps only when the queue is empty or a
    /// call failed; after a successful report it polls again immediately.
    #[instrument(skip(self, shutdown_rx), fields(worker_id = %self.config.worker_id))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Parse worker is disabled, not starting");
            return;
        }

        info!(
            subsystem = "worker",
            poll_interval_ms = self.config.poll_interval_ms,
            parse_timeout_secs = self.config.parse_timeout_secs,
            parser = self.parser.name(),
            "Parse worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Parse worker received shutdown signal");
                break;
            }

            let keep_going = match self.source.fetch_next().await {
                Ok(FetchOutcome::Work(item)) => self.process(item).await,
                Ok(FetchOutcome::Empty) => {
                    debug!(subsystem = "worker", "Queue empty");
                    false
                }
                Err(e) => {
                    error!(subsystem = "worker", op = "fetch_next", error = %e, "Failed to fetch work");
                    let _ = self.event_tx.send(WorkerEvent::FetchFailed {
                        error: e.to_string(),
                    });
                    false
                }
            };

            if !keep_going {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Parse worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Parse worker stopped");
    }

    /// Parse and report one file. Returns whether the report was accepted.
    async fn process(&self, item: WorkItem) -> bool {
        let start = Instant::now();
        let file_id = item.file_id;

        info!(
            subsystem = "worker",
            stored_file_id = %file_id,
            content_hash = %item.hash,
            size_bytes = item.content.len(),
            "Processing file"
        );
        let _ = self.event_tx.send(WorkerEvent::JobFetched { file_id });

        let timeout = Duration::from_secs(self.config.parse_timeout_secs);
        let outcome = match tokio::time::timeout(timeout, self.parser.parse(&item)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    stored_file_id = %file_id,
                    "Parse exceeded timeout of {}s", self.config.parse_timeout_secs
                );
                ParseOutcome::Failed(format!(
                    "Parse exceeded timeout of {}s",
                    self.config.parse_timeout_secs
                ))
            }
        };

        let status = outcome.status();
        let report = ParseReport {
            file_id,
            status,
            result: Some(outcome.into_result()),
        };

        match self.source.report_result(&report).await {
            Ok(()) => {
                info!(
                    subsystem = "worker",
                    stored_file_id = %file_id,
                    status = %status,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Reported parse result"
                );
                let _ = self
                    .event_tx
                    .send(WorkerEvent::JobReported { file_id, status });
                true
            }
            Err(e) => {
                error!(
                    subsystem = "worker",
                    op = "report_result",
                    stored_file_id = %file_id,
                    error = %e,
                    "Failed to report parse result"
                );
                let _ = self.event_tx.send(WorkerEvent::ReportFailed {
                    file_id,
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
