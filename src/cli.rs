//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use harvester_core::FetcherConfig;

/// Build a local corpus of biomedical abstracts.
///
/// Collects document URLs from question-set files, fetches each abstract
/// once with rate limiting and retries, and records failures for a later
/// retry pass.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Data root holding source files, cache, ledger and summary
    #[arg(long, default_value = "data", global = true)]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect unique document URLs and write them to the URL list
    Collect,

    /// Fetch abstracts for every collected URL
    Fetch(RunArgs),

    /// Re-fetch URLs recorded in the failure ledger (conservative defaults)
    Retry(RunArgs),
}

/// Arguments shared by `fetch` and `retry`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Contact email sent to NCBI with every request
    #[arg(long, env = "NCBI_EMAIL")]
    pub email: String,

    /// NCBI API key for higher rate limits
    #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Identifiers per batch
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Maximum requests per second (0 to disable pacing)
    #[arg(short = 'l', long, value_parser = parse_rate)]
    pub rate_limit: Option<f64>,

    /// Maximum concurrent requests (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Total attempts per identifier (1-20)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: Option<u32>,

    /// Base backoff delay in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub retry_delay: Option<u64>,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

impl RunArgs {
    /// Overrides `base` with every value given on the command line.
    pub fn apply(&self, base: FetcherConfig) -> FetcherConfig {
        let mut config = base;
        if let Some(batch_size) = self.batch_size {
            config.batch_size = usize::try_from(batch_size).unwrap_or(usize::MAX);
        }
        if let Some(rate_limit) = self.rate_limit {
            config.rate_limit = rate_limit;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = usize::from(concurrency);
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(secs) = self.retry_delay {
            config.retry_delay = Duration::from_secs(secs);
        }
        config
    }
}

fn parse_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if !rate.is_finite() || rate < 0.0 {
        return Err("rate must be a finite number >= 0".to_string());
    }
    Ok(rate)
}
