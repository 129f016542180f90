//! Domain models shared by the storage, API and worker crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// IDENTITY
// =============================================================================

/// Identifier of an authenticated caller.
///
/// Issued by the external account system; docket never creates or validates
/// users, it only scopes catalog entries by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Parse a user id from a header value.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("User ID is empty".into()));
        }
        trimmed
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| Error::InvalidInput(format!("Invalid user ID: {}", trimmed)))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CONTENT STORE
// =============================================================================

/// The single physical copy of a distinct byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: Uuid,
    /// Lowercase hex SHA-256 of `content`.
    pub content_hash: String,
    pub content: Vec<u8>,
    /// Filename supplied by the first uploader.
    pub original_name: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of resolving uploaded bytes against the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub stored_file_id: Uuid,
    pub content_hash: String,
    /// True only for the caller whose write created the row.
    pub is_new: bool,
}

// =============================================================================
// UPLOAD CATALOG
// =============================================================================

/// One user's reference to a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub stored_file_id: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Row returned when listing a user's uploads.
///
/// Queue fields are `None` when the stored file has no job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadListing {
    pub original_name: String,
    pub upload_date: DateTime<Utc>,
    pub file_content_hash: String,
    pub queue_status: Option<QueueStatus>,
    pub queue_updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// WORK QUEUE
// =============================================================================

/// Parse-job lifecycle state.
///
/// `Queued -> InProgress -> {Parsed | Failed}`. A job may also go straight
/// from `Queued` to a terminal state when a report arrives for a job that was
/// never claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    InProgress,
    #[serde(alias = "success")]
    Parsed,
    Failed,
}

impl QueueStatus {
    /// Database / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "queued",
            QueueStatus::InProgress => "in_progress",
            QueueStatus::Parsed => "parsed",
            QueueStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Parsed | QueueStatus::Failed)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(QueueStatus::Queued),
            "in_progress" => Ok(QueueStatus::InProgress),
            "parsed" | "success" => Ok(QueueStatus::Parsed),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown queue status: {}", other))),
        }
    }
}

/// A parse job tied 1:1 to a stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: Uuid,
    pub stored_file_id: Uuid,
    pub status: QueueStatus,
    /// Payload reported by the worker on completion.
    pub result: Option<JsonValue>,
    /// Worker currently holding the lease, if any.
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Number of times the job has been claimed.
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a worker needs to process a claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedFile {
    pub job_id: Uuid,
    pub stored_file_id: Uuid,
    pub content_hash: String,
    pub content: Vec<u8>,
    pub original_name: String,
}

/// Queue statistics summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: i64,
    pub in_progress: i64,
    pub parsed: i64,
    pub failed: i64,
    pub total: i64,
}
