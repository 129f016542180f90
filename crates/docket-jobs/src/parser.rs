//! Pluggable document parsing.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use docket_core::QueueStatus;

use crate::source::WorkItem;

/// Result of parsing one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Parsed successfully with a result payload.
    Parsed(JsonValue),
    /// Parsing failed with an error message.
    Failed(String),
}

impl ParseOutcome {
    /// Terminal queue status this outcome reports.
    pub fn status(&self) -> QueueStatus {
        match self {
            ParseOutcome::Parsed(_) => QueueStatus::Parsed,
            ParseOutcome::Failed(_) => QueueStatus::Failed,
        }
    }

    /// Payload sent alongside the status.
    pub fn into_result(self) -> JsonValue {
        match self {
            ParseOutcome::Parsed(value) => value,
            ParseOutcome::Failed(error) => json!({ "error": error }),
        }
    }
}

/// Trait for document parsers.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parser name, for logs.
    fn name(&self) -> &str;

    /// Parse one document.
    async fn parse(&self, item: &WorkItem) -> ParseOutcome;
}

/// Stand-in parser that reports every document as parsed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderParser;

#[async_trait]
impl DocumentParser for PlaceholderParser {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn parse(&self, item: &WorkItem) -> ParseOutcome {
        ParseOutcome::Parsed(json!({
            "parsed_content": format!("{} ({} bytes)", item.name, item.content.len()),
            "bytes": item.content.len(),
            "hash": item.hash,
        }))
    }
}

/// No-op parser for testing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpParser;

#[async_trait]
impl DocumentParser for NoOpParser {
    fn name(&self) -> &str {
        "noop"
    }

    async fn parse(&self, _item: &WorkItem) -> ParseOutcome {
        ParseOutcome::Parsed(JsonValue::Null)
    }
}
