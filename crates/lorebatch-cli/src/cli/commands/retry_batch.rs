//! `lorebatch retry-batch` – write the retry request set for failed items.

use anyhow::Result;
use lorebatch_core::batch::{read_requests_jsonl, write_requests_jsonl};
use lorebatch_core::config::LorebatchConfig;
use lorebatch_core::failure::BatchFailureHandler;
use std::path::Path;

pub fn run_retry_batch(
    cfg: &LorebatchConfig,
    requests_path: &Path,
    failed: &[String],
    out: &Path,
) -> Result<()> {
    let requests = read_requests_jsonl(requests_path)?;
    let handler = BatchFailureHandler::new(cfg.batch.handler_options());
    let retry = handler.create_retry_batch(&requests, failed);
    if retry.len() < failed.len() {
        tracing::warn!(
            requested = failed.len(),
            matched = retry.len(),
            "some failed ids matched no request"
        );
    }
    write_requests_jsonl(out, &retry)?;
    println!("Wrote {} retry requests to {}", retry.len(), out.display());
    Ok(())
}
