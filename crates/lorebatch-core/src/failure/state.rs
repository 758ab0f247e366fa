//! Failed request ids accumulated per batch across retry rounds.

use std::collections::BTreeMap;

/// batch_id -> failed ids, in the order they were reported. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    failed: BTreeMap<String, Vec<String>>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `ids` to the failures recorded for `batch_id`.
    pub fn record_failures<S: AsRef<str>>(&mut self, batch_id: &str, ids: &[S]) {
        self.failed
            .entry(batch_id.to_string())
            .or_default()
            .extend(ids.iter().map(|id| id.as_ref().to_string()));
    }

    pub fn failed_for(&self, batch_id: &str) -> &[String] {
        self.failed.get(batch_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct batches that have ever reported a failure.
    pub fn failed_batches(&self) -> usize {
        self.failed.len()
    }

    /// Failed ids across all batches (duplicates counted).
    pub fn total_failed_requests(&self) -> usize {
        self.failed.values().map(Vec::len).sum()
    }

    pub fn batch_ids(&self) -> impl Iterator<Item = &str> {
        self.failed.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_concatenate_per_batch() {
        let mut state = RetryState::new();
        state.record_failures("B1", &["a", "b"]);
        state.record_failures("B1", &["c", "a"]);
        assert_eq!(state.failed_for("B1"), ["a", "b", "c", "a"]);
        assert_eq!(state.failed_batches(), 1);
        assert_eq!(state.total_failed_requests(), 4);
    }

    #[test]
    fn unknown_batch_has_no_failures() {
        let state = RetryState::new();
        assert!(state.failed_for("nope").is_empty());
        assert!(state.is_empty());
    }

    #[test]
    fn empty_failure_list_still_registers_batch() {
        let mut state = RetryState::new();
        state.record_failures::<&str>("B2", &[]);
        assert_eq!(state.batch_ids().collect::<Vec<_>>(), vec!["B2"]);
        assert_eq!(state.total_failed_requests(), 0);
    }
}
