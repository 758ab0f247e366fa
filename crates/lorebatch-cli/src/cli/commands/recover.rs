//! `lorebatch recover` – list (or dump) saved partial results.

use anyhow::Result;
use lorebatch_core::partial::PartialResultStore;
use std::path::Path;

pub fn run_recover(output: &Path, json: bool) -> Result<()> {
    let store = PartialResultStore::new(output);
    let recovered = store.recover_partial_results();
    if json {
        println!("{}", serde_json::to_string_pretty(&recovered)?);
        return Ok(());
    }
    if recovered.is_empty() {
        println!("No partial results in {}", store.dir().display());
    } else {
        println!("{} partial results in {}", recovered.len(), store.dir().display());
        for item_id in recovered.keys() {
            println!("  {item_id}");
        }
    }
    Ok(())
}
