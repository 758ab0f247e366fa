//! CLI command handlers, one file per command.

mod cleanup;
mod metadata;
mod recover;
mod retry_batch;
mod run;

pub use cleanup::run_cleanup;
pub use metadata::run_metadata;
pub use recover::run_recover;
pub use retry_batch::run_retry_batch;
pub use run::run_batch;
