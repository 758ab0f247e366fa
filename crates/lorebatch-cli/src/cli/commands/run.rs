//! `lorebatch run --requests FILE` – submit, poll, save, retry until done.

use anyhow::{bail, Result};
use lorebatch_core::api::HttpBatchClient;
use lorebatch_core::batch::read_requests_jsonl;
use lorebatch_core::config::LorebatchConfig;
use lorebatch_core::failure::BatchFailureHandler;
use lorebatch_core::orchestrator::Orchestrator;
use lorebatch_core::partial::PartialResultStore;
use std::path::Path;

pub fn run_batch(
    cfg: &LorebatchConfig,
    requests_path: &Path,
    output: &Path,
    skip_recovered: bool,
) -> Result<()> {
    let requests = read_requests_jsonl(requests_path)?;
    if requests.is_empty() {
        println!("No requests in {}", requests_path.display());
        return Ok(());
    }

    let client = HttpBatchClient::from_env(cfg.api.client_options())?;
    let mut options = cfg.batch.orchestrator_options()?;
    options.skip_recovered = skip_recovered;
    let mut orchestrator = Orchestrator::new(
        client,
        cfg.retry_policy()?,
        BatchFailureHandler::new(cfg.batch.handler_options()),
        PartialResultStore::new(output),
        options,
    );

    let total = requests.len();
    let report = orchestrator.run(requests)?;

    println!(
        "{} rounds, batches: {}",
        report.rounds,
        if report.batch_ids.is_empty() {
            "-".to_string()
        } else {
            report.batch_ids.join(", ")
        }
    );
    println!(
        "{:<10} {}\n{:<10} {}\n{:<10} {}",
        "succeeded",
        report.succeeded.len(),
        "recovered",
        report.recovered.len(),
        "abandoned",
        report.abandoned.len()
    );
    println!(
        "failed batches: {}, failed requests: {}",
        report.statistics.failed_batches, report.statistics.total_failed_requests
    );

    if !report.is_complete() {
        bail!(
            "{} of {} items still failing: {}",
            report.abandoned.len(),
            total,
            report.abandoned.join(", ")
        );
    }
    Ok(())
}
