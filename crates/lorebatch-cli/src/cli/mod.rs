//! CLI for the lorebatch batch resilience layer.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lorebatch_core::config::{self, LorebatchConfig};
use std::path::PathBuf;

use commands::{run_batch, run_cleanup, run_metadata, run_recover, run_retry_batch};

/// Top-level CLI for lorebatch.
#[derive(Debug, Parser)]
#[command(name = "lorebatch")]
#[command(
    about = "lorebatch: retrying batch submission with durable partial results",
    long_about = None
)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG config path.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Submit a JSONL request file as a batch and drive it to completion.
    Run {
        /// JSONL file, one `{"custom_id": ..., "params": {...}}` per line.
        #[arg(long, value_name = "FILE")]
        requests: PathBuf,
        /// Output location (partial results go under `partial_results/`).
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Resubmit items even if a saved partial result exists.
        #[arg(long)]
        no_skip_recovered: bool,
    },

    /// List items with saved partial results.
    Recover {
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Print the recovered results as one JSON object keyed by item id.
        #[arg(long)]
        json: bool,
    },

    /// Delete saved partial results for the given item ids.
    Cleanup {
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Item identifiers.
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Show the save metadata recorded for a batch.
    Metadata {
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
        batch_id: String,
    },

    /// Build a retry request file from a request file and failed item ids.
    RetryBatch {
        #[arg(long, value_name = "FILE")]
        requests: PathBuf,
        /// Failed item ids (request ids without prefix or retry suffix).
        #[arg(long = "failed", value_name = "ID", required = true, num_args = 1..)]
        failed: Vec<String>,
        /// Where to write the retry JSONL.
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                requests,
                output,
                no_skip_recovered,
            } => {
                let output = output_dir(&cfg, output);
                run_batch(&cfg, &requests, &output, !no_skip_recovered)?;
            }
            CliCommand::Recover { output, json } => run_recover(&output_dir(&cfg, output), json)?,
            CliCommand::Cleanup { output, ids } => run_cleanup(&output_dir(&cfg, output), &ids)?,
            CliCommand::Metadata { output, batch_id } => {
                run_metadata(&output_dir(&cfg, output), &batch_id)?;
            }
            CliCommand::RetryBatch {
                requests,
                failed,
                out,
            } => run_retry_batch(&cfg, &requests, &failed, &out)?,
        }

        Ok(())
    }
}

fn output_dir(cfg: &LorebatchConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| cfg.output_dir.clone())
}

#[cfg(test)]
mod tests;
