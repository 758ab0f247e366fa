//! Recovery strategy and retry batch construction.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::state::RetryState;
use crate::batch::BatchRequest;

/// What the orchestrator should do about a failed batch. Only one action exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    CreateRetryBatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
}

/// Classification of one batch failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    pub batch_id: String,
    pub failed_count: usize,
    pub retry_candidates: Vec<String>,
    pub recovery_action: RecoveryAction,
    pub priority: Priority,
}

/// Snapshot of accumulated failure state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStatistics {
    pub failed_batches: usize,
    pub total_failed_requests: usize,
    pub retry_handler_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Strategies with more failures than this are `Priority::High`.
    pub high_priority_threshold: usize,
    /// Batch-specific prefix stripped from request ids to get item ids.
    pub request_id_prefix: String,
    /// Appended to the request id of each retried request.
    pub retry_suffix: String,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            high_priority_threshold: 10,
            request_id_prefix: "storyline-".to_string(),
            retry_suffix: "-retry".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchFailureHandler {
    state: RetryState,
    options: HandlerOptions,
}

impl BatchFailureHandler {
    pub fn new(options: HandlerOptions) -> Self {
        Self {
            state: RetryState::new(),
            options,
        }
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// Item id for a request id: prefix removed, then any stacked retry suffixes.
    ///
    /// `storyline-ABRIOND-retry-retry` -> `ABRIOND`; ids without the prefix are
    /// kept as-is apart from suffix stripping.
    pub fn item_id_of<'a>(&self, request_id: &'a str) -> &'a str {
        let mut id = request_id
            .strip_prefix(self.options.request_id_prefix.as_str())
            .unwrap_or(request_id);
        let suffix = self.options.retry_suffix.as_str();
        if !suffix.is_empty() {
            while let Some(stripped) = id.strip_suffix(suffix) {
                if stripped.is_empty() {
                    break;
                }
                id = stripped;
            }
        }
        id
    }

    /// Record `failed_ids` for `batch_id` (appending) and classify the failure.
    pub fn handle_batch_failure<S: AsRef<str>>(
        &mut self,
        batch_id: &str,
        failed_ids: &[S],
    ) -> RecoveryStrategy {
        tracing::info!(
            batch_id,
            failed = failed_ids.len(),
            "handling batch failure for {}",
            batch_id
        );
        self.state.record_failures(batch_id, failed_ids);

        let failed_count = failed_ids.len();
        let priority = if failed_count > self.options.high_priority_threshold {
            Priority::High
        } else {
            Priority::Normal
        };
        let strategy = RecoveryStrategy {
            batch_id: batch_id.to_string(),
            failed_count,
            retry_candidates: failed_ids.iter().map(|id| id.as_ref().to_string()).collect(),
            recovery_action: RecoveryAction::CreateRetryBatch,
            priority,
        };
        tracing::info!(
            batch_id,
            action = ?strategy.recovery_action,
            priority = ?strategy.priority,
            "recovery strategy prepared"
        );
        strategy
    }

    /// Copies of the requests whose item id is in `failed_item_ids`, in input order,
    /// each with the retry suffix appended to its request id. Others are dropped.
    pub fn create_retry_batch<S: AsRef<str>>(
        &self,
        original_requests: &[BatchRequest],
        failed_item_ids: &[S],
    ) -> Vec<BatchRequest> {
        let failed: HashSet<&str> = failed_item_ids.iter().map(AsRef::as_ref).collect();
        let retry_requests: Vec<BatchRequest> = original_requests
            .iter()
            .filter(|request| failed.contains(self.item_id_of(&request.request_id)))
            .map(|request| BatchRequest {
                request_id: format!("{}{}", request.request_id, self.options.retry_suffix),
                batch_id: None,
                params: request.params.clone(),
                extra: request.extra.clone(),
            })
            .collect();
        tracing::info!(
            requests = retry_requests.len(),
            "created retry batch with {} requests",
            retry_requests.len()
        );
        retry_requests
    }

    pub fn get_retry_statistics(&self) -> RetryStatistics {
        let stats = RetryStatistics {
            failed_batches: self.state.failed_batches(),
            total_failed_requests: self.state.total_failed_requests(),
            retry_handler_active: true,
        };
        tracing::debug!(
            failed_batches = stats.failed_batches,
            total_failed_requests = stats.total_failed_requests,
            "retry statistics"
        );
        stats
    }
}
