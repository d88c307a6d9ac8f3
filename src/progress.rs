//! Progress UI (spinner) for fetch runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use harvester_core::FetchStats;
use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the progress spinner when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    stats: Arc<FetchStats>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(stats, Arc::clone(&stop));
    (Some(handle), stop)
}

/// Spinner only on an interactive, non-dumb stderr and when not quiet.
pub(crate) fn should_use_spinner(stderr_is_terminal: bool, quiet: bool, disabled: bool) -> bool {
    let dumb = std::env::var("TERM").is_ok_and(|term| term == "dumb");
    stderr_is_terminal && !quiet && !disabled && !dumb
}

fn spawn_spinner_inner(stats: Arc<FetchStats>, stop: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            spinner.set_message(progress_message(&stats));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

fn progress_message(stats: &FetchStats) -> String {
    format!(
        "[{}/{}] fetched {}, cached {}, failed {} ({} requests)",
        stats.processed(),
        stats.total(),
        stats.fetched(),
        stats.cached(),
        stats.failed(),
        stats.requests(),
    )
}
