//! Progress UI for the download phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use feedsync_core::{TelemetrySnapshot, TransferTelemetry};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

const REFRESH: Duration = Duration::from_millis(120);

/// Spawns the transfer progress bar when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `enabled` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    enabled: bool,
    telemetry: TransferTelemetry,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !enabled {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_bar_inner(telemetry, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_bar_inner(telemetry: TransferTelemetry, stop: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} {wide_msg} [{bar:30}] {percent:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            let snapshot = telemetry.snapshot();
            bar.set_length(snapshot.total_bytes.max(1));
            bar.set_position(snapshot.bytes_copied.min(snapshot.total_bytes.max(1)));
            bar.set_message(status_line(&snapshot));
            tokio::time::sleep(REFRESH).await;
        }

        bar.finish_and_clear();
    })
}

/// One-line description of the current transfer.
fn status_line(snapshot: &TelemetrySnapshot) -> String {
    if snapshot.file_name.is_empty() {
        return "waiting for first transfer...".to_string();
    }
    let total = if snapshot.total_bytes == 0 {
        "?".to_string()
    } else {
        HumanBytes(snapshot.total_bytes).to_string()
    };
    format!(
        "{} {}/{} {}/s",
        snapshot.file_name,
        HumanBytes(snapshot.bytes_copied),
        total,
        HumanBytes(snapshot.bytes_per_sec)
    )
}
