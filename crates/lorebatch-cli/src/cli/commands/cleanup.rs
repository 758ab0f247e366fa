//! `lorebatch cleanup <id>...` – delete saved partial results.

use anyhow::Result;
use lorebatch_core::partial::PartialResultStore;
use std::path::Path;

pub fn run_cleanup(output: &Path, ids: &[String]) -> Result<()> {
    let store = PartialResultStore::new(output);
    let removed = store.cleanup_partial_results(ids);
    println!("Removed {removed} of {} partial results", ids.len());
    Ok(())
}
