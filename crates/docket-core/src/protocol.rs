//! Wire types exchanged between the API and the remote parse worker.
//!
//! `GET /parse` answers with a [`ParseTask`]; the worker replies on
//! `POST /parse-result` with a [`ParseReport`].

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ClaimedFile, QueueStatus};

/// A claimed file as sent to the worker. Content travels base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseTask {
    pub file_id: Uuid,
    pub content: String,
    pub hash: String,
    pub name: String,
}

impl ParseTask {
    /// Decode the base64 content back into raw bytes.
    pub fn decode_content(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.content)
            .map_err(|e| Error::Serialization(format!("Invalid base64 content: {}", e)))
    }
}

impl From<ClaimedFile> for ParseTask {
    fn from(file: ClaimedFile) -> Self {
        Self {
            file_id: file.stored_file_id,
            content: base64::engine::general_purpose::STANDARD.encode(&file.content),
            hash: file.content_hash,
            name: file.original_name,
        }
    }
}

/// Completion report sent by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseReport {
    pub file_id: Uuid,
    pub status: QueueStatus,
    #[serde(default)]
    pub result: Option<JsonValue>,
}
