//! Health and queue observability.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use docket_core::QueueStats;

use crate::{ApiError, AppState};

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Job counts per status.
pub async fn queue_stats(State(state): State<AppState>) -> Result<Json<QueueStats>, ApiError> {
    Ok(Json(state.jobs.stats().await?))
}
