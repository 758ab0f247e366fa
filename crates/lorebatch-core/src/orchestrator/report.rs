use serde::Serialize;

use crate::failure::RetryStatistics;

/// Summary of one orchestrated run. Ids are item ids, not request ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Batches submitted (first plus retries).
    pub rounds: u32,
    pub batch_ids: Vec<String>,
    /// Items that succeeded during this run and were saved as partial results.
    pub succeeded: Vec<String>,
    /// Items skipped because a previous run already saved them.
    pub recovered: Vec<String>,
    /// Items still failing when rounds ran out.
    pub abandoned: Vec<String>,
    pub statistics: RetryStatistics,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.abandoned.is_empty()
    }
}
