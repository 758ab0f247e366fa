//! Partial result store.
//!
//! Durable per-item results for batches that did not fully complete, so a
//! crash or resumed run never regenerates finished items. Layout under the
//! output location:
//!
//! - `partial_results/{item_id}_partial.json`: one record per successful item
//! - `partial_results/batch_{batch_id}_metadata.json`: one record per save call
//!
//! Records are independent files written via temp file + rename, so readers
//! never observe a torn record. There is no cross-file transaction: concurrent
//! writers of the same item give at-least-once, last-writer-wins semantics.
//! Cleanup is the only deletion path.

mod metadata;
mod naming;

pub use metadata::BatchSaveMetadata;
pub use naming::{item_id_from_file_name, partial_file_name, validate_id, PARTIAL_DIR_NAME};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::batch::ItemResult;
use naming::metadata_file_name;

#[derive(Debug, Clone)]
pub struct PartialResultStore {
    dir: PathBuf,
}

impl PartialResultStore {
    /// Store rooted at `{output_location}/partial_results`. Nothing is created until a save.
    pub fn new(output_location: impl AsRef<Path>) -> Self {
        Self {
            dir: output_location.as_ref().join(PARTIAL_DIR_NAME),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partial_path(&self, item_id: &str) -> PathBuf {
        self.dir.join(partial_file_name(item_id))
    }

    pub fn metadata_path(&self, batch_id: &str) -> PathBuf {
        self.dir.join(metadata_file_name(batch_id))
    }

    /// Persist every successful item in `results` and one metadata record for the call.
    ///
    /// Per-item write failures are logged and skipped. Returns true iff at least
    /// one item was written. An empty map returns false without touching disk.
    /// Use [`save_items`](Self::save_items) to learn which items were written.
    pub fn save_partial_results(
        &self,
        batch_id: &str,
        results: &BTreeMap<String, ItemResult>,
    ) -> bool {
        !self.save_items(batch_id, results).saved.is_empty()
    }

    /// Same as [`save_partial_results`](Self::save_partial_results), reporting
    /// per item whether its record is on disk.
    pub fn save_items(&self, batch_id: &str, results: &BTreeMap<String, ItemResult>) -> SaveReport {
        let mut report = SaveReport::default();
        if results.is_empty() {
            tracing::warn!(batch_id, "no successful results to save");
            return report;
        }

        if let Err(e) = fs::create_dir_all(&self.dir) {
            tracing::error!(
                dir = %self.dir.display(),
                error = %e,
                "could not create partial results directory"
            );
            for (item_id, result) in results {
                match result {
                    ItemResult::Succeeded(_) => report.unsaved.push(item_id.clone()),
                    ItemResult::Errored(_) => report.errored.push(item_id.clone()),
                }
            }
            return report;
        }

        for (item_id, result) in results {
            let payload = match result {
                ItemResult::Succeeded(payload) => payload,
                ItemResult::Errored(_) => {
                    report.errored.push(item_id.clone());
                    continue;
                }
            };
            match self.write_item(item_id, payload) {
                Ok(()) => {
                    tracing::info!(item_id = item_id.as_str(), "saved partial result");
                    report.saved.push(item_id.clone());
                }
                Err(e) => {
                    tracing::error!(
                        item_id = item_id.as_str(),
                        error = %format!("{e:#}"),
                        "failed to save partial result"
                    );
                    report.unsaved.push(item_id.clone());
                }
            }
        }

        let metadata = BatchSaveMetadata {
            batch_id: batch_id.to_string(),
            partial_results_count: report.saved.len(),
            failed_items: report.errored.clone(),
            timestamp: metadata::now_secs(),
        };
        if let Err(e) = self.write_metadata(&metadata) {
            tracing::error!(batch_id, error = %format!("{e:#}"), "failed to save batch metadata");
        }

        let saved = report.saved.len();
        tracing::info!(
            batch_id,
            saved,
            unsaved = report.unsaved.len(),
            "saved {} partial results from batch {}",
            saved,
            batch_id
        );
        report
    }

    /// Read back every per-item record. Missing directory means nothing to recover;
    /// unreadable or corrupt records are logged and left out.
    pub fn recover_partial_results(&self) -> BTreeMap<String, Value> {
        let mut recovered = BTreeMap::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(
                    dir = %self.dir.display(),
                    "no partial results directory found"
                );
                return recovered;
            }
            Err(e) => {
                tracing::error!(
                    dir = %self.dir.display(),
                    error = %e,
                    "cannot list partial results"
                );
                return recovered;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(error = %e, "cannot read partial results entry");
                    continue;
                }
            };
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(item_id) = item_id_from_file_name(name) else {
                continue;
            };
            match read_json(&entry.path()) {
                Ok(payload) => {
                    tracing::info!(item_id, "recovered partial result");
                    recovered.insert(item_id.to_string(), payload);
                }
                Err(e) => {
                    tracing::error!(
                        item_id,
                        error = %format!("{e:#}"),
                        "failed to recover partial result"
                    );
                }
            }
        }

        if !recovered.is_empty() {
            tracing::info!(
                count = recovered.len(),
                "recovered {} partial results",
                recovered.len()
            );
        }
        recovered
    }

    /// Delete the records for exactly `item_ids`; absent records are ignored.
    /// Returns how many files were removed.
    pub fn cleanup_partial_results<S: AsRef<str>>(&self, item_ids: &[S]) -> usize {
        let mut cleaned = 0usize;
        for item_id in item_ids {
            let item_id = item_id.as_ref();
            if let Err(e) = validate_id(item_id) {
                tracing::warn!(item_id, error = %e, "skipping cleanup of invalid item id");
                continue;
            }
            match fs::remove_file(self.partial_path(item_id)) {
                Ok(()) => cleaned += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(item_id, error = %e, "failed to clean up partial file");
                }
            }
        }
        if cleaned > 0 {
            tracing::info!(cleaned, "cleaned up {} partial result files", cleaned);
        }
        cleaned
    }

    /// Metadata written by a previous save of `batch_id`, if any.
    pub fn read_metadata(&self, batch_id: &str) -> Result<Option<BatchSaveMetadata>> {
        validate_id(batch_id).context("invalid batch id")?;
        let path = self.metadata_path(batch_id);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read metadata: {}", path.display())),
        };
        let metadata = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse metadata: {}", path.display()))?;
        Ok(Some(metadata))
    }

    fn write_item(&self, item_id: &str, payload: &Value) -> Result<()> {
        validate_id(item_id)?;
        write_json_atomic(&self.dir, &self.partial_path(item_id), payload)
    }

    fn write_metadata(&self, metadata: &BatchSaveMetadata) -> Result<()> {
        validate_id(&metadata.batch_id).context("invalid batch id")?;
        write_json_atomic(&self.dir, &self.metadata_path(&metadata.batch_id), metadata)
    }
}

/// Which items of one save call ended up on disk. Ids are in map order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Successful items whose record was written.
    pub saved: Vec<String>,
    /// Successful items whose record could not be written.
    pub unsaved: Vec<String>,
    /// Items whose result was an error; never written.
    pub errored: Vec<String>,
}

/// Pretty-printed UTF-8 JSON via a hidden temp file in `dir`, fsync, then rename.
fn write_json_atomic<T: Serialize + ?Sized>(dir: &Path, path: &Path, value: &T) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value).context("serialize record")?;
    tmp.flush()?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}
