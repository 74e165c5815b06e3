//! Terminal progress for the ingest binary

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chessdex_ingest::IngestStats;

/// How often the spinner message is refreshed from the counters
const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// One-line progress message
pub fn progress_message(stats: &IngestStats) -> String {
    let summary = stats.snapshot();
    format!(
        "{} games read, {} indexed, {} duplicates, {} malformed, {} batches in flight",
        summary.games_read,
        summary.documents_created,
        summary.documents_duplicate,
        summary.games_malformed,
        stats.batches_in_flight()
    )
}

/// Refresh `pb` from `stats` until `done` is cancelled.
pub fn spawn_reporter(
    pb: ProgressBar,
    stats: Arc<IngestStats>,
    done: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            tokio::select! {
                _ = done.cancelled() => break,
                _ = ticker.tick() => pb.set_message(progress_message(&stats)),
            }
        }
        pb.finish_with_message(progress_message(&stats));
    })
}
