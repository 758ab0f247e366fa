//! File names inside the partial-results directory.

use anyhow::{bail, Result};

/// Subdirectory of the output location that holds partial results.
pub const PARTIAL_DIR_NAME: &str = "partial_results";

const PARTIAL_SUFFIX: &str = "_partial.json";

/// `{item_id}_partial.json`
pub fn partial_file_name(item_id: &str) -> String {
    format!("{item_id}{PARTIAL_SUFFIX}")
}

/// `batch_{batch_id}_metadata.json`
pub fn metadata_file_name(batch_id: &str) -> String {
    format!("batch_{batch_id}_metadata.json")
}

/// Item id encoded in a partial file name, if `name` is one.
/// Hidden files (in-flight temp files) never count.
pub fn item_id_from_file_name(name: &str) -> Option<&str> {
    if name.starts_with('.') {
        return None;
    }
    name.strip_suffix(PARTIAL_SUFFIX).filter(|id| !id.is_empty())
}

/// Reject ids that would not map to a single plain file inside the directory.
///
/// Ids are identities, so unlike display filenames they are never rewritten:
/// an id with a separator, a control character, or a leading dot is refused.
pub fn validate_id(id: &str) -> Result<()> {
    const NAME_MAX: usize = 255;

    if id.is_empty() {
        bail!("empty id");
    }
    if id.starts_with('.') {
        bail!("id {id:?} starts with '.'");
    }
    if id.chars().any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control()) {
        bail!("id {id:?} contains a path separator or control character");
    }
    if id.len() + PARTIAL_SUFFIX.len().max("batch__metadata.json".len()) > NAME_MAX {
        bail!("id {id:?} is too long for a file name");
    }
    Ok(())
}
