//! Worker-facing endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use docket_core::defaults;
use docket_core::{ParseReport, ParseTask};
use docket_jobs::FetchOutcome;

use crate::{ApiError, AppState};

fn worker_id_from_headers(headers: &HeaderMap) -> &str {
    headers
        .get(defaults::WORKER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(defaults::ANONYMOUS_WORKER_ID)
}

/// Claim the next queued file.
///
/// # Returns
/// - 200 OK with `{fileId, content, hash, name}`, content base64-encoded
/// - 404 Not Found when the queue is empty
pub async fn claim_file(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ParseTask>, ApiError> {
    let worker_id = worker_id_from_headers(&headers);
    match state.protocol.fetch_next(worker_id).await? {
        FetchOutcome::Work(item) => Ok(Json(ParseTask::from(item))),
        FetchOutcome::Empty => Err(ApiError::NotFound("No files in queue".into())),
    }
}

/// Record a worker's result for a file.
///
/// # Returns
/// - 200 OK with plain text `File status updated successfully`
/// - 400 Bad Request for a malformed body or a non-terminal status
/// - 404 Not Found when the file has no job
pub async fn submit_result(
    State(state): State<AppState>,
    payload: Result<Json<ParseReport>, JsonRejection>,
) -> Result<(StatusCode, &'static str), ApiError> {
    let Json(report) =
        payload.map_err(|e| ApiError::BadRequest(format!("Invalid parse result: {}", e)))?;

    state.protocol.report_result(&report).await?;

    Ok((StatusCode::OK, "File status updated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_worker_id_defaults_to_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(worker_id_from_headers(&headers), "anonymous");

        headers.insert("x-worker-id", HeaderValue::from_static("  "));
        assert_eq!(worker_id_from_headers(&headers), "anonymous");

        headers.insert("x-worker-id", HeaderValue::from_static("w-3"));
        assert_eq!(worker_id_from_headers(&headers), "w-3");
    }
}
