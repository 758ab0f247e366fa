//! Per-item results of a finished batch.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use super::{BatchRequest, BatchStatus};

/// Key whose presence in a raw payload object marks it as an error record.
pub const ERROR_MARKER: &str = "error";

/// Outcome of one item: success payload or error payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemResult {
    Succeeded(Value),
    Errored(Value),
}

impl ItemResult {
    /// Classify a raw payload: an object carrying an `"error"` key is an error.
    ///
    /// This is the only place payload shape is inspected; downstream code
    /// matches on the variant.
    pub fn from_payload(payload: Value) -> Self {
        let is_error = payload
            .as_object()
            .is_some_and(|obj| obj.contains_key(ERROR_MARKER));
        if is_error {
            ItemResult::Errored(payload)
        } else {
            ItemResult::Succeeded(payload)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemResult::Succeeded(_))
    }

    pub fn payload(&self) -> &Value {
        match self {
            ItemResult::Succeeded(v) | ItemResult::Errored(v) => v,
        }
    }
}

impl From<Value> for ItemResult {
    fn from(payload: Value) -> Self {
        ItemResult::from_payload(payload)
    }
}

/// Result of one submitted batch, keyed by request id.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub status: BatchStatus,
    pub results: BTreeMap<String, ItemResult>,
}

impl BatchOutcome {
    pub fn new(batch_id: impl Into<String>, status: BatchStatus) -> Self {
        Self {
            batch_id: batch_id.into(),
            status,
            results: BTreeMap::new(),
        }
    }

    /// Submitted request ids that have no entry in this outcome, in submission order.
    pub fn missing_requests(&self, submitted: &[BatchRequest]) -> Vec<String> {
        submitted
            .iter()
            .filter(|r| !self.results.contains_key(&r.request_id))
            .map(|r| r.request_id.clone())
            .collect()
    }

    /// Request ids present in the outcome that were never submitted.
    pub fn unexpected_requests(&self, submitted: &[BatchRequest]) -> Vec<String> {
        let known: HashSet<&str> = submitted.iter().map(|r| r.request_id.as_str()).collect();
        self.results
            .keys()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.succeeded_count()
    }
}
