//! Blocking HTTP client for the Message Batches API (libcurl easy handles).

use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::error::ApiError;
use super::parse::{parse_batch_status, parse_results_jsonl};
use super::BatchApi;
use crate::batch::{BatchOutcome, BatchProgress, BatchRequest};

const BATCHES_PATH: &str = "v1/messages/batches";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub api_version: String,
    /// Environment variable read for the API key.
    pub api_key_env: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

pub struct HttpBatchClient {
    base: Url,
    api_key: String,
    options: ClientOptions,
}

#[derive(Serialize)]
struct CreateBatchBody<'a> {
    requests: &'a [BatchRequest],
}

enum Method<'a> {
    Get,
    Post(&'a [u8]),
}

impl HttpBatchClient {
    /// Build a client, reading the API key from `options.api_key_env`.
    pub fn from_env(options: ClientOptions) -> Result<Self, ApiError> {
        let api_key = std::env::var(&options.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ApiError::MissingKey(options.api_key_env.clone()))?;
        Self::with_key(options, api_key)
    }

    pub fn with_key(options: ClientOptions, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let mut base = options.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            base: Url::parse(&base)?,
            api_key: api_key.into(),
            options,
        })
    }

    fn batches_url(&self) -> Result<Url, ApiError> {
        Ok(self.base.join(BATCHES_PATH)?)
    }

    fn batch_url(&self, batch_id: &str, tail: &str) -> Result<Url, ApiError> {
        let mut url = self.batches_url()?;
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::decode(self.base.as_str(), "base URL cannot have path segments")
            })?
            .push(batch_id)
            .extend(tail.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Perform one request and return the body of a 2xx response.
    fn request(&self, url: &Url, method: Method<'_>) -> Result<Vec<u8>, ApiError> {
        let mut body = Vec::new();
        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.options.connect_timeout)?;
        easy.timeout(self.options.timeout)?;

        let mut headers = curl::easy::List::new();
        headers.append(&format!("x-api-key: {}", self.api_key))?;
        headers.append(&format!("anthropic-version: {}", self.options.api_version))?;
        headers.append("content-type: application/json")?;
        match method {
            Method::Get => easy.get(true)?,
            Method::Post(payload) => {
                easy.post(true)?;
                easy.post_fields_copy(payload)?;
            }
        }
        easy.http_headers(headers)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            if let Err(e) = transfer.perform() {
                let err = ApiError::Transport(e);
                tracing::warn!(
                    endpoint = url.as_str(),
                    kind = ?err.kind(),
                    transient = err.kind().is_transient(),
                    error = %err,
                    "batch API transport failure"
                );
                return Err(err);
            }
        }

        let status = easy.response_code()?;
        if !(200..300).contains(&status) {
            let err = ApiError::Http {
                status,
                endpoint: url.path().to_string(),
                body: String::from_utf8_lossy(&body).chars().take(512).collect(),
            };
            tracing::warn!(
                endpoint = url.as_str(),
                status,
                kind = ?err.kind(),
                transient = err.kind().is_transient(),
                "batch API returned error status"
            );
            return Err(err);
        }
        Ok(body)
    }
}

impl BatchApi for HttpBatchClient {
    fn submit(&self, requests: &[BatchRequest]) -> Result<String, ApiError> {
        let url = self.batches_url()?;
        let payload = serde_json::to_vec(&CreateBatchBody { requests })
            .map_err(|e| ApiError::decode(url.as_str(), e.to_string()))?;
        tracing::info!(
            requests = requests.len(),
            "submitting batch with {} requests",
            requests.len()
        );
        let body = self.request(&url, Method::Post(&payload))?;
        let created = parse_batch_status(url.as_str(), &body)?;
        tracing::info!(batch_id = created.id.as_str(), "batch submitted");
        Ok(created.id)
    }

    fn poll(&self, batch_id: &str) -> Result<BatchProgress, ApiError> {
        let url = self.batch_url(batch_id, "")?;
        let body = self.request(&url, Method::Get)?;
        let progress = parse_batch_status(url.as_str(), &body)?.progress();
        tracing::info!(
            batch_id,
            status = progress.status.as_str(),
            completed = progress.counts.completed(),
            total = progress.counts.total(),
            "batch status"
        );
        Ok(progress)
    }

    fn results(&self, batch_id: &str) -> Result<BatchOutcome, ApiError> {
        let status_url = self.batch_url(batch_id, "")?;
        let status_body = self.request(&status_url, Method::Get)?;
        let status = parse_batch_status(status_url.as_str(), &status_body)?;
        let url = match status.results_url.as_deref() {
            Some(u) => Url::parse(u)?,
            None => self.batch_url(batch_id, "results")?,
        };
        tracing::info!(batch_id, "retrieving results");
        let body = self.request(&url, Method::Get)?;
        let mut outcome = parse_results_jsonl(url.as_str(), batch_id, &body)?;
        outcome.status = status.status();
        tracing::info!(
            batch_id,
            succeeded = outcome.succeeded_count(),
            total = outcome.results.len(),
            "retrieved {}/{} successful results",
            outcome.succeeded_count(),
            outcome.results.len()
        );
        Ok(outcome)
    }
}
