//! Cooperative cancellation for long retry and poll loops.
//!
//! A `CancelToken` is a shared flag. The retry loop checks it before each
//! attempt and after each backoff sleep; the orchestrator checks it between
//! status polls. Setting it never interrupts an operation already running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
