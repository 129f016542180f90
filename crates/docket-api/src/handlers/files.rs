//! Upload and listing endpoints.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;

use docket_core::defaults;
use docket_core::{UploadListing, UserId};

use crate::{ApiError, AppState};

/// Read the caller's id from `X-User-Id`.
///
/// Missing header is 401; a present but malformed one is 400.
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let value = headers
        .get(defaults::USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".into()))?;
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("X-User-Id header is not valid text".into()))?;
    Ok(UserId::parse(raw)?)
}

/// Upload a file.
///
/// # Multipart Fields
/// - `file`: the document (required)
///
/// # Returns
/// - 200 OK with `{"message": "File has been uploaded successfully"}`
/// - 400 Bad Request if the file is missing, empty, too large or of the wrong type
/// - 401 Unauthorized without `X-User-Id`
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let mut multipart =
        multipart.map_err(|e| ApiError::BadRequest(format!("Expected multipart form: {}", e)))?;

    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some(defaults::UPLOAD_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(defaults::UNNAMED_UPLOAD)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
        upload = Some((name, bytes.to_vec()));
    }

    let (name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".into()))?;

    state.ingestion.ingest(user_id, &bytes, &name).await?;

    Ok(Json(json!({
        "message": "File has been uploaded successfully",
    })))
}

/// List the caller's uploads, oldest first.
pub async fn list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UploadListing>>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let uploads = state.ingestion.list_uploads(user_id).await?;
    Ok(Json(uploads))
}
