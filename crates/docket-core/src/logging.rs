//! Structured logging field names for docket.
//!
//! All crates use these constants for consistent structured logging fields so
//! log aggregation can query the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "ingest", "queue", "worker"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "content_store", "catalog", "work_queue", "pool", "sweeper"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "resolve", "record_upload", "claim_next", "record_completion"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Stored file UUID.
pub const STORED_FILE_ID: &str = "stored_file_id";

/// Queue job UUID.
pub const JOB_ID: &str = "job_id";

/// Upload record UUID.
pub const UPLOAD_ID: &str = "upload_id";

/// Caller id from the external account system.
pub const USER_ID: &str = "user_id";

/// Claiming worker identity.
pub const WORKER_ID: &str = "worker_id";

/// Content hash (hex SHA-256).
pub const CONTENT_HASH: &str = "content_hash";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Size of uploaded content in bytes.
pub const SIZE_BYTES: &str = "size_bytes";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether resolve created a new stored file.
pub const IS_NEW: &str = "is_new";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
