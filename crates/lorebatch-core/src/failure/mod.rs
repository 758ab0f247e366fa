//! Batch failure handling.
//!
//! Turns a batch's mixed outcome into an accumulated record of failed ids
//! (`RetryState`), a recovery strategy, and a retry batch containing only the
//! failed items. Classification is binary: an item either succeeded or it did
//! not. The state is owned by whoever drives the batch lifecycle (one
//! orchestrator), never shared process-wide.

mod handler;
mod state;

pub use handler::{
    BatchFailureHandler, HandlerOptions, Priority, RecoveryAction, RecoveryStrategy,
    RetryStatistics,
};
pub use state::RetryState;
