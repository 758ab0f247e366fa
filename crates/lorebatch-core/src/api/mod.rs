//! Batch API boundary.
//!
//! The orchestrator talks to the batch service through [`BatchApi`]: submit a
//! request set, poll its status, fetch per-item results. [`HttpBatchClient`]
//! implements it over HTTP with libcurl; tests use in-memory fakes.

mod classify;
mod error;
mod http;
mod parse;

pub use classify::{classify_curl_error, classify_http_status, ErrorKind};
pub use error::ApiError;
pub use http::{ClientOptions, HttpBatchClient};
pub use parse::{parse_batch_status, parse_results_jsonl, BatchStatusResponse};

use crate::batch::{BatchOutcome, BatchProgress, BatchRequest};

/// Operations the resilience layer needs from an asynchronous batch service.
pub trait BatchApi {
    /// Submit `requests` as one batch; returns the new batch id.
    fn submit(&self, requests: &[BatchRequest]) -> Result<String, ApiError>;

    /// Current processing status of a batch.
    fn poll(&self, batch_id: &str) -> Result<BatchProgress, ApiError>;

    /// Per-item results of an ended batch, keyed by request id.
    fn results(&self, batch_id: &str) -> Result<BatchOutcome, ApiError>;
}

impl<A: BatchApi + ?Sized> BatchApi for &A {
    fn submit(&self, requests: &[BatchRequest]) -> Result<String, ApiError> {
        (**self).submit(requests)
    }

    fn poll(&self, batch_id: &str) -> Result<BatchProgress, ApiError> {
        (**self).poll(batch_id)
    }

    fn results(&self, batch_id: &str) -> Result<BatchOutcome, ApiError> {
        (**self).results(batch_id)
    }
}
