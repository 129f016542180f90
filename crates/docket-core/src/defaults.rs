//! Centralized default constants for docket.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers; `from_env()` constructors fall back to them.

// =============================================================================
// SERVER
// =============================================================================

/// Default bind host.
pub const HOST: &str = "0.0.0.0";

/// Default HTTP port.
pub const PORT: u16 = 3000;

/// Default database URL.
pub const DATABASE_URL: &str = "postgres://localhost/docket";

/// Header carrying the pre-authenticated caller id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header a worker may use to identify itself when claiming.
pub const WORKER_ID_HEADER: &str = "x-worker-id";

/// Claimant recorded when a worker does not identify itself.
pub const ANONYMOUS_WORKER_ID: &str = "anonymous";

// =============================================================================
// INGESTION
// =============================================================================

/// The single accepted upload type.
pub const ACCEPTED_MIME_TYPE: &str = "application/pdf";

/// Maximum accepted upload size (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field holding the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Display name used when the multipart part carries no filename.
pub const UNNAMED_UPLOAD: &str = "upload.pdf";

// =============================================================================
// QUEUE
// =============================================================================

/// How long a claim stays exclusive before the sweep requeues it.
pub const QUEUE_LEASE_SECS: u64 = 300;

/// Interval between lease sweeps.
pub const QUEUE_SWEEP_INTERVAL_SECS: u64 = 60;

// =============================================================================
// WORKER
// =============================================================================

/// Base URL the worker polls.
pub const WORKER_API_URL: &str = "http://127.0.0.1:3000";

/// Fixed sleep between polls when the queue is empty or a call failed.
pub const WORKER_POLL_INTERVAL_MS: u64 = 20_000;

/// Upper bound on a single parse.
pub const WORKER_PARSE_TIMEOUT_SECS: u64 = 120;

/// Timeout for one HTTP call from the worker.
pub const WORKER_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Capacity of the worker event broadcast channel.
pub const WORKER_EVENT_CAPACITY: usize = 64;

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Default maximum number of connections in the pool.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Default number of connections kept open while idle.
pub const POOL_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds.
pub const POOL_MAX_LIFETIME_SECS: u64 = 1800;
