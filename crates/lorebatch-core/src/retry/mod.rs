//! Retry and backoff policy.
//!
//! A general retry primitive for fallible operations (batch submission,
//! status polls, result retrieval). The policy decides when to retry and how
//! long to wait; `execute_with_retry` runs the loop. Neither knows about
//! batches.

mod error;
mod policy;
mod run;
mod sleep;

pub use error::RetryError;
pub use policy::{RetryDecision, RetryPolicy};
pub use run::{execute_with_retry, execute_with_retry_using, AttemptOutcome, RetryAttempt};
pub use sleep::{Sleeper, ThreadSleeper};
