//! Parse batch API response bodies.

use serde::Deserialize;
use serde_json::Value;

use super::error::ApiError;
use crate::batch::{BatchOutcome, BatchProgress, BatchStatus, ItemResult, RequestCounts};

/// Body of a create or retrieve batch response (fields we use).
#[derive(Debug, Clone, Deserialize)]
pub struct BatchStatusResponse {
    pub id: String,
    pub processing_status: String,
    #[serde(default)]
    pub request_counts: RequestCounts,
    #[serde(default)]
    pub results_url: Option<String>,
}

impl BatchStatusResponse {
    pub fn status(&self) -> BatchStatus {
        match self.processing_status.as_str() {
            "in_progress" | "canceling" => BatchStatus::InProgress,
            "ended" => BatchStatus::Ended,
            other => {
                tracing::warn!(
                    batch_id = self.id.as_str(),
                    status = other,
                    "unknown processing status; treating as failed"
                );
                BatchStatus::Failed
            }
        }
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            batch_id: self.id.clone(),
            status: self.status(),
            counts: self.request_counts,
        }
    }
}

pub fn parse_batch_status(endpoint: &str, body: &[u8]) -> Result<BatchStatusResponse, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::decode(endpoint, e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ResultLine {
    custom_id: String,
    result: Value,
}

/// Parse a JSONL results body into an ended outcome.
///
/// `succeeded` lines yield the `message` object as success payload; any other
/// result type (`errored`, `canceled`, `expired`) yields the whole result object
/// as error payload. For a duplicated id the first line wins.
pub fn parse_results_jsonl(
    endpoint: &str,
    batch_id: &str,
    body: &[u8],
) -> Result<BatchOutcome, ApiError> {
    let text = std::str::from_utf8(body).map_err(|e| ApiError::decode(endpoint, e.to_string()))?;
    let mut outcome = BatchOutcome::new(batch_id, BatchStatus::Ended);

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ResultLine = serde_json::from_str(line)
            .map_err(|e| ApiError::decode(endpoint, format!("line {}: {}", idx + 1, e)))?;
        let result_type = parsed.result.get("type").and_then(Value::as_str).unwrap_or("");
        let item = match result_type {
            "succeeded" => match parsed.result.get("message") {
                Some(message) => ItemResult::Succeeded(message.clone()),
                None => {
                    return Err(ApiError::decode(
                        endpoint,
                        format!("line {}: succeeded result without message", idx + 1),
                    ))
                }
            },
            _ => {
                tracing::warn!(
                    batch_id,
                    request_id = parsed.custom_id.as_str(),
                    result_type,
                    "request did not succeed"
                );
                ItemResult::Errored(parsed.result)
            }
        };
        if outcome.results.contains_key(&parsed.custom_id) {
            tracing::warn!(
                batch_id,
                request_id = parsed.custom_id.as_str(),
                "duplicate result ignored"
            );
            continue;
        }
        outcome.results.insert(parsed.custom_id, item);
    }
    Ok(outcome)
}
