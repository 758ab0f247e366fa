//! Batch data model: requests, status, and per-item outcomes.
//!
//! Payloads are opaque JSON values; this layer only tracks identifiers and
//! whether each item succeeded.

mod jsonl;
mod outcome;

pub use jsonl::{read_requests_jsonl, write_requests_jsonl};
pub use outcome::{BatchOutcome, ItemResult, ERROR_MARKER};

use serde::{Deserialize, Serialize};

/// One request in a batch. Identity is `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(rename = "custom_id")]
    pub request_id: String,
    /// Batch currently owning this request; set on submission, never sent on the wire.
    #[serde(skip)]
    pub batch_id: Option<String>,
    pub params: serde_json::Value,
    /// Other top-level fields of the request line, passed through unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BatchRequest {
    pub fn new(request_id: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            request_id: request_id.into(),
            batch_id: None,
            params,
            extra: serde_json::Map::new(),
        }
    }
}

/// Processing state of a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Ended,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Ended | BatchStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Ended => "ended",
            BatchStatus::Failed => "failed",
        }
    }
}

/// Per-state request counts reported by a status poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub succeeded: u64,
    #[serde(default)]
    pub errored: u64,
    #[serde(default)]
    pub canceled: u64,
    #[serde(default)]
    pub expired: u64,
}

impl RequestCounts {
    pub fn total(&self) -> u64 {
        self.processing + self.completed()
    }

    /// Requests that reached any final state.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.errored + self.canceled + self.expired
    }
}

/// Result of one status poll.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub batch_id: String,
    pub status: BatchStatus,
    pub counts: RequestCounts,
}
