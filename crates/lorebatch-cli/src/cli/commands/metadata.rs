//! `lorebatch metadata <batch_id>` – show a batch's save metadata.

use anyhow::Result;
use lorebatch_core::partial::PartialResultStore;
use std::path::Path;

pub fn run_metadata(output: &Path, batch_id: &str) -> Result<()> {
    let store = PartialResultStore::new(output);
    match store.read_metadata(batch_id)? {
        Some(meta) => println!("{}", serde_json::to_string_pretty(&meta)?),
        None => println!("No metadata for batch {batch_id}"),
    }
    Ok(())
}
