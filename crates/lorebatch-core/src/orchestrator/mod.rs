//! Batch orchestrator: submit, poll, partition, persist, retry.
//!
//! One `Orchestrator` owns one batch lifecycle: its `BatchFailureHandler`
//! (and so its `RetryState`) is never shared with another orchestrator. Every
//! call into the batch service goes through `execute_with_retry_using`, and
//! the only blocking points are backoff sleeps and the fixed poll interval.

mod report;

pub use report::RunReport;

use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::api::BatchApi;
use crate::batch::{BatchOutcome, BatchRequest, BatchStatus, ItemResult};
use crate::control::CancelToken;
use crate::failure::BatchFailureHandler;
use crate::partial::PartialResultStore;
use crate::retry::{execute_with_retry_using, RetryPolicy, Sleeper, ThreadSleeper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Wait between status polls.
    pub poll_interval: Duration,
    /// Submission rounds including the first; at least 1.
    pub max_rounds: u32,
    /// Drop requests whose item already has a saved partial result.
    pub skip_recovered: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_rounds: 3,
            skip_recovered: true,
        }
    }
}

pub struct Orchestrator<A, S = ThreadSleeper> {
    api: A,
    sleeper: S,
    policy: RetryPolicy,
    handler: BatchFailureHandler,
    store: PartialResultStore,
    options: OrchestratorOptions,
    cancel: Option<CancelToken>,
}

impl<A: BatchApi> Orchestrator<A, ThreadSleeper> {
    pub fn new(
        api: A,
        policy: RetryPolicy,
        handler: BatchFailureHandler,
        store: PartialResultStore,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            api,
            sleeper: ThreadSleeper,
            policy,
            handler,
            store,
            options,
            cancel: None,
        }
    }
}

impl<A: BatchApi, S: Sleeper> Orchestrator<A, S> {
    /// Replace the sleeper used for backoff and poll waits.
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Orchestrator<A, S2> {
        Orchestrator {
            api: self.api,
            sleeper,
            policy: self.policy,
            handler: self.handler,
            store: self.store,
            options: self.options,
            cancel: self.cancel,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn handler(&self) -> &BatchFailureHandler {
        &self.handler
    }

    pub fn store(&self) -> &PartialResultStore {
        &self.store
    }

    /// Drive `requests` to completion or until rounds run out.
    ///
    /// Successful items are persisted to the partial store as soon as their
    /// batch ends; a success that cannot be persisted is retried like a failure.
    /// Requests mapping to an item id already seen are dropped before submission.
    /// Exhausting retries on a service call aborts the run with that error;
    /// items saved so far stay on disk.
    pub fn run(&mut self, requests: Vec<BatchRequest>) -> Result<RunReport> {
        if self.options.max_rounds == 0 {
            bail!("max_rounds must be at least 1");
        }
        let mut report = RunReport::default();

        let mut pending = self.dedupe_items(requests);
        if self.options.skip_recovered {
            let recovered = self.store.recover_partial_results();
            pending.retain(|r| {
                let item_id = self.handler.item_id_of(&r.request_id);
                if recovered.contains_key(item_id) {
                    report.recovered.push(item_id.to_string());
                    false
                } else {
                    true
                }
            });
            if !report.recovered.is_empty() {
                tracing::info!(
                    skipped = report.recovered.len(),
                    "skipping {} items with saved partial results",
                    report.recovered.len()
                );
            }
        }

        while !pending.is_empty() {
            report.rounds += 1;
            let round = report.rounds;
            tracing::info!(round, requests = pending.len(), "starting batch round");

            let batch_id = self.submit(&mut pending)?;
            report.batch_ids.push(batch_id.clone());

            let status = self.wait_for_terminal(&batch_id)?;
            let outcome = match status {
                BatchStatus::Ended => self.fetch_results(&batch_id)?,
                _ => {
                    tracing::error!(batch_id = batch_id.as_str(), "batch processing failed");
                    BatchOutcome::new(batch_id.clone(), BatchStatus::Failed)
                }
            };

            let (item_results, mut failed_items) = self.partition(&pending, &outcome);
            let saved = self.store.save_items(&batch_id, &item_results);
            if !saved.unsaved.is_empty() {
                tracing::error!(
                    batch_id = batch_id.as_str(),
                    unsaved = saved.unsaved.len(),
                    "successful items could not be saved; treating them as failed"
                );
            }
            report.succeeded.extend(saved.saved);
            failed_items.extend(saved.unsaved);

            if failed_items.is_empty() {
                tracing::info!(batch_id = batch_id.as_str(), "batch fully succeeded");
                break;
            }

            let strategy = self.handler.handle_batch_failure(&batch_id, &failed_items);
            if round >= self.options.max_rounds {
                tracing::error!(
                    batch_id = batch_id.as_str(),
                    abandoned = failed_items.len(),
                    "max rounds reached; abandoning {} items",
                    failed_items.len()
                );
                report.abandoned = failed_items;
                break;
            }
            pending = self
                .handler
                .create_retry_batch(&pending, &strategy.retry_candidates);
        }

        report.statistics = self.handler.get_retry_statistics();
        tracing::info!(
            rounds = report.rounds,
            succeeded = report.succeeded.len(),
            recovered = report.recovered.len(),
            abandoned = report.abandoned.len(),
            "batch run finished"
        );
        Ok(report)
    }

    fn submit(&self, pending: &mut [BatchRequest]) -> Result<String> {
        let batch_id = execute_with_retry_using(
            &self.policy,
            "submit batch",
            &self.sleeper,
            self.cancel.as_ref(),
            || self.api.submit(pending),
        )?;
        for request in pending.iter_mut() {
            request.batch_id = Some(batch_id.clone());
        }
        Ok(batch_id)
    }

    fn wait_for_terminal(&self, batch_id: &str) -> Result<BatchStatus> {
        loop {
            let progress = execute_with_retry_using(
                &self.policy,
                "poll batch",
                &self.sleeper,
                self.cancel.as_ref(),
                || self.api.poll(batch_id),
            )?;
            if progress.status.is_terminal() {
                return Ok(progress.status);
            }
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                bail!("cancelled while waiting for batch {batch_id}");
            }
            self.sleeper.sleep(self.options.poll_interval);
        }
    }

    fn fetch_results(&self, batch_id: &str) -> Result<BatchOutcome> {
        let outcome = execute_with_retry_using(
            &self.policy,
            "retrieve results",
            &self.sleeper,
            self.cancel.as_ref(),
            || self.api.results(batch_id),
        )
        .with_context(|| format!("results for batch {batch_id}"))?;
        Ok(outcome)
    }

    /// Keep the first request per item id; later ones would write the same record.
    fn dedupe_items(&self, requests: Vec<BatchRequest>) -> Vec<BatchRequest> {
        let mut seen = HashSet::new();
        requests
            .into_iter()
            .filter(|request| {
                let item_id = self.handler.item_id_of(&request.request_id);
                if seen.insert(item_id.to_string()) {
                    true
                } else {
                    tracing::warn!(
                        request_id = request.request_id.as_str(),
                        item_id,
                        "dropping request for an item that is already in the batch"
                    );
                    false
                }
            })
            .collect()
    }

    /// Re-key an outcome by item id and list the failed items, walking `submitted`
    /// in order. Requests with no result count as failures.
    fn partition(
        &self,
        submitted: &[BatchRequest],
        outcome: &BatchOutcome,
    ) -> (BTreeMap<String, ItemResult>, Vec<String>) {
        let mut item_results: BTreeMap<String, ItemResult> = BTreeMap::new();
        let mut failed = Vec::new();

        if outcome.status == BatchStatus::Ended {
            let missing = outcome.missing_requests(submitted);
            if !missing.is_empty() {
                tracing::warn!(
                    batch_id = outcome.batch_id.as_str(),
                    missing = missing.len(),
                    "ended batch is missing results; treating them as failed"
                );
            }
            let unexpected = outcome.unexpected_requests(submitted);
            if !unexpected.is_empty() {
                tracing::warn!(
                    batch_id = outcome.batch_id.as_str(),
                    unexpected = unexpected.len(),
                    "outcome contains ids that were not submitted; ignoring them"
                );
            }
        }

        for request in submitted {
            let item_id = self.handler.item_id_of(&request.request_id).to_string();
            match outcome.results.get(&request.request_id) {
                Some(result) => {
                    if let ItemResult::Errored(payload) = result {
                        tracing::debug!(
                            item_id = item_id.as_str(),
                            error = %payload,
                            "item failed"
                        );
                        failed.push(item_id.clone());
                    }
                    item_results.insert(item_id, result.clone());
                }
                None => failed.push(item_id),
            }
        }
        (item_results, failed)
    }
}
