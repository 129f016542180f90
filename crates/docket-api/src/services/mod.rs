//! Services composing the storage repositories.

pub mod ingestion;
pub mod sweeper;
pub mod worker_protocol;

pub use ingestion::{IngestConfig, IngestOutcome, IngestionService};
pub use sweeper::{LeaseSweeper, SweeperConfig, SweeperHandle};
pub use worker_protocol::{InProcessSource, WorkerProtocol};
