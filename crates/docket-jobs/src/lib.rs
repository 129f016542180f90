//! # docket-jobs
//!
//! Remote parse worker for docket.
//!
//! This crate provides:
//! - A poll loop that claims files, parses them and reports the outcome
//! - The pluggable [`DocumentParser`] capability
//! - [`WorkSource`], with an HTTP client for the docket API
//! - Lifecycle events via broadcast channels and graceful shutdown
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docket_jobs::{HttpWorkSource, ParseWorker, PlaceholderParser, WorkerConfig};
//!
//! let config = WorkerConfig::from_env();
//! let source = HttpWorkSource::new(&config.api_url, &config.worker_id)?;
//! let worker = ParseWorker::new(Arc::new(source), Arc::new(PlaceholderParser), config);
//!
//! let handle = worker.start();
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! ```

pub mod parser;
pub mod source;
pub mod telemetry;
pub mod worker;

// Re-export core types
pub use docket_core::*;

pub use parser::{DocumentParser, NoOpParser, ParseOutcome, PlaceholderParser};
pub use source::{FetchOutcome, HttpWorkSource, WorkItem, WorkSource};
pub use worker::{ParseWorker, WorkerConfig, WorkerEvent, WorkerHandle};
