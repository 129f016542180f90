//! Background task returning expired claims to the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use docket_core::defaults;
use docket_core::{Error, Result, WorkQueue};

/// Lease and sweep timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// How long a claim stays exclusive.
    pub lease: Duration,
    /// Time between sweeps.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(defaults::QUEUE_LEASE_SECS),
            interval: Duration::from_secs(defaults::QUEUE_SWEEP_INTERVAL_SECS),
        }
    }
}

impl SweeperConfig {
    /// Read `QUEUE_LEASE_SECS` and `QUEUE_SWEEP_INTERVAL_SECS`.
    pub fn from_env() -> Self {
        let base = Self::default();
        let secs = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
        };

        Self {
            lease: secs("QUEUE_LEASE_SECS").unwrap_or(base.lease),
            interval: secs("QUEUE_SWEEP_INTERVAL_SECS").unwrap_or(base.interval),
        }
    }
}

/// Handle for a running sweeper.
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        // The task may already be gone; joining below reports that.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Lease sweeper task failed: {}", e)))
    }
}

/// Periodically requeues claims whose lease has expired.
pub struct LeaseSweeper {
    jobs: Arc<dyn WorkQueue>,
    config: SweeperConfig,
}

impl LeaseSweeper {
    pub fn new(jobs: Arc<dyn WorkQueue>, config: SweeperConfig) -> Self {
        Self { jobs, config }
    }

    /// Run one sweep.
    pub async fn sweep_once(&self) -> Result<u64> {
        let requeued = self.jobs.requeue_expired(self.config.lease).await?;
        debug!(subsystem = "queue", component = "lease_sweeper", requeued, "Sweep finished");
        Ok(requeued)
    }

    /// Spawn the sweep loop.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        SweeperHandle { shutdown_tx, task }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            subsystem = "queue",
            component = "lease_sweeper",
            lease_secs = self.config.lease.as_secs(),
            interval_secs = self.config.interval.as_secs(),
            "Lease sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = sleep(self.config.interval) => {}
            }

            if let Err(e) = self.sweep_once().await {
                error!(
                    subsystem = "queue",
                    component = "lease_sweeper",
                    error = %e,
                    "Lease sweep failed"
                );
            }
        }

        info!(subsystem = "queue", component = "lease_sweeper", "Lease sweeper stopped");
    }
}
