//! Per-save metadata record.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Written once per `save_partial_results` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSaveMetadata {
    pub batch_id: String,
    /// Items written by this call.
    pub partial_results_count: usize,
    /// Items whose result was an error and were not written.
    pub failed_items: Vec<String>,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
