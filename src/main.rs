//! CLI entry point for the abstract harvester.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use harvester_core::fetch::DEFAULT_TOOL_NAME;
use harvester_core::{
    DataLayout, EntrezClient, EntrezConfig, FetcherConfig, Pipeline, RunOutcome, collect_urls,
};
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::{Cli, Command, RunArgs};

/// Which driver a `fetch`/`retry` invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Driver {
    Fetch,
    Retry,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(data_dir = %cli.data_dir.display(), verbose = cli.verbose, "CLI arguments parsed");

    let layout = DataLayout::new(&cli.data_dir);
    match &cli.command {
        Command::Collect => run_collect(&layout),
        Command::Fetch(args) => run_driver(Driver::Fetch, args, layout, cli.quiet).await,
        Command::Retry(args) => run_driver(Driver::Retry, args, layout, cli.quiet).await,
    }
}

fn run_collect(layout: &DataLayout) -> Result<ExitCode> {
    let urls = collect_urls(layout).context("failed to export URL list")?;
    if urls.is_empty() {
        warn!(root = %layout.root().display(), "No document URLs found");
        return Ok(ExitCode::SUCCESS);
    }
    println!(
        "Collected {} unique URLs into {}",
        urls.len(),
        layout.url_list_path().display()
    );
    Ok(ExitCode::SUCCESS)
}

async fn run_driver(
    driver: Driver,
    args: &RunArgs,
    layout: DataLayout,
    quiet: bool,
) -> Result<ExitCode> {
    let (base, tool) = match driver {
        Driver::Fetch => (FetcherConfig::default(), DEFAULT_TOOL_NAME.to_string()),
        Driver::Retry => (
            FetcherConfig::conservative(),
            format!("{DEFAULT_TOOL_NAME}-retry"),
        ),
    };
    let config = args.apply(base);
    debug!(?config, ?driver, "fetcher configuration");

    let entrez = EntrezConfig::new(&args.email)
        .with_api_key(args.api_key.clone())
        .with_tool(tool);
    let client = EntrezClient::new(entrez).context("failed to build HTTP client")?;
    let pipeline = Pipeline::new(Arc::new(client), &config, layout)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let use_spinner =
        progress::should_use_spinner(io::stderr().is_terminal(), quiet, args.no_progress);
    let (progress_handle, progress_stop) =
        progress::spawn_progress_ui(use_spinner, pipeline.stats());

    let result = match driver {
        Driver::Fetch => pipeline.run(Arc::clone(&interrupted)).await,
        Driver::Retry => pipeline.retry_failed(Arc::clone(&interrupted)).await,
    };

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    let outcome = result?;
    let stats = pipeline.stats();
    info!(
        fetched = stats.fetched(),
        cached = stats.cached(),
        failed = stats.failed(),
        retried = stats.retried(),
        requests = stats.requests(),
        "Harvest complete"
    );

    match &outcome {
        RunOutcome::NothingToDo => match driver {
            Driver::Fetch => println!("No document URLs found. Nothing to fetch."),
            Driver::Retry => println!("No failed URLs to retry."),
        },
        RunOutcome::Completed(summary) => {
            println!("Total URLs: {}", summary.total_urls);
            println!("Successfully fetched: {}", summary.successful_fetches);
            println!("Failed: {}", summary.failed_fetches);
            println!(
                "Abstracts saved to: {}",
                summary.cache_directory_path.display()
            );
            if summary.failed_fetches > 0 {
                println!(
                    "Failed URLs recorded in {}; run `harvester retry` to try them again.",
                    pipeline.ledger().path().display()
                );
            }
        }
    }

    if interrupted.load(Ordering::SeqCst) || stats.was_interrupted() {
        warn!("Interrupted. Run again to resume.");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
