//! docket API server.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use docket_api::{
    create_router, AppState, InProcessSource, IngestConfig, LeaseSweeper, ServerConfig,
    StorageBackend, SweeperConfig,
};
use docket_db::{log_pool_metrics, Database, MemoryStore, PoolConfig};
use docket_jobs::telemetry::{init_tracing, shutdown_signal};
use docket_jobs::{ParseWorker, PlaceholderParser, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Keep the guard alive for the life of the process.
    let _log_guard = init_tracing(
        "docket_api=info,docket_db=info,docket_jobs=info,tower_http=info",
        "docket-api.log",
    );

    let config = ServerConfig::from_env()?;
    let ingest_config = IngestConfig::from_env();
    info!(
        backend = %config.backend,
        accepted_mime_type = %ingest_config.accepted_mime_type,
        max_upload_bytes = ingest_config.max_upload_bytes,
        "Starting docket API"
    );

    let (state, db) = match config.backend {
        StorageBackend::Postgres => {
            let pool_config = PoolConfig::from_env();
            info!(
                max_connections = pool_config.max_connections,
                min_connections = pool_config.min_connections,
                "Connecting to Postgres"
            );
            let db = Database::connect_with_config(&config.database_url, pool_config)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to run migrations")?;
            log_pool_metrics(db.pool());
            let state = AppState::new(
                Arc::new(db.files.clone()),
                Arc::new(db.uploads.clone()),
                Arc::new(db.jobs.clone()),
                ingest_config,
            );
            (state, Some(db))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on exit");
            (AppState::in_memory(MemoryStore::new(), ingest_config), None)
        }
    };

    let sweeper = LeaseSweeper::new(state.jobs.clone(), SweeperConfig::from_env()).start();

    let worker = if config.embedded_worker {
        let worker_config = WorkerConfig::from_env();
        let source = InProcessSource::new(state.protocol.clone(), worker_config.worker_id.clone());
        let worker = ParseWorker::new(Arc::new(source), Arc::new(PlaceholderParser), worker_config);
        info!("Embedded parse worker enabled");
        Some(worker.start())
    } else {
        None
    };

    let app = create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    if let Some(worker) = worker {
        if worker.shutdown().await.is_ok() {
            worker.join().await?;
        }
    }
    sweeper.shutdown().await?;
    if let Some(db) = db {
        db.close().await;
    }

    Ok(())
}
