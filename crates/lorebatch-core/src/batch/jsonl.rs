//! Request files: one JSON request per line.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

use super::BatchRequest;

/// Read a JSONL request file. Blank lines are skipped; a malformed line is an error
/// naming its line number.
pub fn read_requests_jsonl(path: &Path) -> Result<Vec<BatchRequest>> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read requests: {}", path.display()))?;
    let mut requests = Vec::new();
    for (idx, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let request: BatchRequest = serde_json::from_str(line)
            .with_context(|| format!("parse request at {}:{}", path.display(), idx + 1))?;
        requests.push(request);
    }
    Ok(requests)
}

/// Write requests as JSONL (creates parent dir if needed).
pub fn write_requests_jsonl(path: &Path, requests: &[BatchRequest]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let mut file =
        fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    for request in requests {
        file.write_all(serde_json::to_string(request)?.as_bytes())?;
        file.write_all(b"\n")?;
    }
    file.flush()?;
    Ok(())
}
