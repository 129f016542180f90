//! `docket-worker`: polls the docket API for files to parse.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use docket_jobs::telemetry::{init_tracing, shutdown_signal};
use docket_jobs::{HttpWorkSource, ParseWorker, PlaceholderParser, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _log_guard = init_tracing("docket_jobs=info,docket_worker=info", "docket-worker.log");

    let config = WorkerConfig::from_env();
    if !config.enabled {
        info!("WORKER_ENABLED is false, exiting");
        return Ok(());
    }

    info!(
        api_url = %config.api_url,
        worker_id = %config.worker_id,
        poll_interval_ms = config.poll_interval_ms,
        "Starting docket worker"
    );

    let source = HttpWorkSource::new(&config.api_url, &config.worker_id)
        .context("Failed to create API client")?;
    let worker = ParseWorker::new(Arc::new(source), Arc::new(PlaceholderParser), config);
    let handle = worker.start();

    shutdown_signal().await;
    info!("Shutdown requested, stopping worker");

    handle.shutdown().await.context("Failed to signal worker")?;
    handle.join().await.context("Worker did not stop cleanly")?;
    Ok(())
}
