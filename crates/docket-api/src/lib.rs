//! # docket-api
//!
//! HTTP API server for docket.
//!
//! Routes:
//! - `POST /files`, `GET /files`: upload and list, scoped by `X-User-Id`
//! - `GET /parse`, `POST /parse-result`: worker claim and completion
//! - `GET /health`, `GET /queue/stats`

pub mod config;
pub mod error;
pub mod handlers;
pub mod services;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use docket_core::{new_v7, ContentStore, UploadCatalog, WorkQueue};
use docket_db::MemoryStore;

pub use config::{ServerConfig, StorageBackend};
pub use error::ApiError;
pub use services::{
    InProcessSource, IngestConfig, IngestOutcome, IngestionService, LeaseSweeper, SweeperConfig,
    WorkerProtocol,
};

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionService>,
    pub protocol: Arc<WorkerProtocol>,
    pub jobs: Arc<dyn WorkQueue>,
}

impl AppState {
    pub fn new(
        files: Arc<dyn ContentStore>,
        uploads: Arc<dyn UploadCatalog>,
        jobs: Arc<dyn WorkQueue>,
        config: IngestConfig,
    ) -> Self {
        Self {
            ingestion: Arc::new(IngestionService::new(files, uploads, jobs.clone(), config)),
            protocol: Arc::new(WorkerProtocol::new(jobs.clone())),
            jobs,
        }
    }

    /// State over a single in-memory backend.
    pub fn in_memory(store: MemoryStore, config: IngestConfig) -> Self {
        Self::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            config,
        )
    }
}

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = new_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router with its middleware stack.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state
        .ingestion
        .config()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handlers::system::health_check))
        .route("/queue/stats", get(handlers::system::queue_stats))
        .route(
            "/files",
            post(handlers::files::upload_file).get(handlers::files::list_files),
        )
        .route("/parse", get(handlers::parse::claim_file))
        .route("/parse-result", post(handlers::parse::submit_result))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        // Size is enforced here rather than by axum's 2 MB extractor default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
