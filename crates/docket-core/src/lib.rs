//! # docket-core
//!
//! Core types, traits, and abstractions for docket, a deduplicating document
//! ingestion service with a parse-work queue.
//!
//! This crate provides the data structures, repository traits and wire types
//! that the storage, worker and API crates depend on.

pub mod content_type;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod protocol;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use content_type::{ensure_accepted, sniff_mime_type};
pub use error::{Error, Result};
pub use models::*;
pub use protocol::{ParseReport, ParseTask};
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
