//! Resumable downloader: fetch resolved media into the download directory.
//!
//! Each record is written to `<save_name>.mp4.part` first and renamed to
//! `<save_name>.mp4` only after the whole body arrived, so the final path
//! never holds a partial file. The web URL is tried first; the mobile URL is
//! the fallback.
//!
//! # Example
//!
//! ```no_run
//! use feedsync_core::download::{HttpClient, TransferTelemetry, download_one};
//! use feedsync_core::catalog::{Catalog, CatalogRecord};
//! use std::path::Path;
//!
//! # async fn example(catalog: Catalog, record: CatalogRecord) -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let telemetry = TransferTelemetry::new();
//! let path = download_one(&catalog, &client, &record, Path::new("./media"), &telemetry).await?;
//! println!("published {}", path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod telemetry;

pub use client::HttpClient;
pub use constants::{FAILURE_STATUS_THRESHOLD, TEMP_SUFFIX};
pub use error::DownloadError;
pub use telemetry::{CountingWriter, TelemetrySnapshot, TransferTelemetry};

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{CatalogRecord, CatalogStore, UrlField};
use crate::error::PipelineError;
use crate::naming::sanitize_save_name;
use crate::site::MEDIA_EXTENSION;

/// Final published path for a save name.
#[must_use]
pub fn target_path(download_dir: &Path, save_name: &str) -> PathBuf {
    download_dir.join(format!("{save_name}{MEDIA_EXTENSION}"))
}

/// In-progress path for a final path.
#[must_use]
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Counts from one download phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Files published.
    pub completed: usize,
    /// Records whose every URL failed.
    pub failed: usize,
}

impl DownloadStats {
    /// Records attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }
}

/// Downloads one record, trying the web URL and then the mobile URL.
///
/// The outcome is written back as the record's advisory `download_error`:
/// the failure text on error, cleared on success. A record without any
/// resolved URL fails without touching the network.
///
/// # Errors
///
/// - [`DownloadError::UnsafeSaveName`] when the save name is not a plain file name
/// - [`DownloadError::NoDownloadUrl`] when both URLs are empty
/// - the single attempt's error when only one URL was available
/// - [`DownloadError::AllUrlsFailed`] when both were tried
#[instrument(skip_all, fields(id = record.id, save_name = %record.save_name))]
pub async fn download_one(
    store: &dyn CatalogStore,
    client: &HttpClient,
    record: &CatalogRecord,
    download_dir: &Path,
    telemetry: &TransferTelemetry,
) -> Result<PathBuf, DownloadError> {
    let target = target_path(download_dir, &record.save_name);
    let result = if sanitize_save_name(&record.save_name) == record.save_name {
        fetch_with_fallback(client, record, &target, telemetry).await
    } else {
        Err(DownloadError::UnsafeSaveName {
            save_name: record.save_name.clone(),
        })
    };

    let advisory = match &result {
        Ok(_) if record.download_error.is_empty() => None,
        Ok(_) => Some(String::new()),
        Err(error) => Some(error.to_string()),
    };
    if let Some(message) = advisory
        && let Err(store_error) = store.record_download_error(record.id, &message).await
    {
        warn!(error = %store_error, "failed to record download outcome");
    }

    result.map(|()| target)
}

async fn fetch_with_fallback(
    client: &HttpClient,
    record: &CatalogRecord,
    target: &Path,
    telemetry: &TransferTelemetry,
) -> Result<(), DownloadError> {
    let candidates: Vec<(UrlField, &str)> = [UrlField::Web, UrlField::Mobile]
        .into_iter()
        .map(|field| (field, record.download_url(field)))
        .filter(|(_, url)| !url.is_empty())
        .collect();

    if candidates.is_empty() {
        return Err(DownloadError::NoDownloadUrl {
            save_name: record.save_name.clone(),
        });
    }

    let mut failures = Vec::with_capacity(candidates.len());
    for (field, url) in candidates {
        match fetch_and_publish(client, url, target, telemetry).await {
            Ok(bytes) => {
                info!(source = field.as_str(), bytes, path = %target.display(), "published");
                return Ok(());
            }
            Err(error) => {
                warn!(source = field.as_str(), error = %error, "download attempt failed");
                failures.push(error);
            }
        }
    }

    if failures.len() == 1
        && let Some(only) = failures.pop()
    {
        return Err(only);
    }
    Err(DownloadError::AllUrlsFailed {
        save_name: record.save_name.clone(),
        message: failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    })
}

/// Streams into the temporary path, then renames onto `target`.
///
/// A failed transfer leaves its temporary file in place; the next attempt
/// removes it before starting.
async fn fetch_and_publish(
    client: &HttpClient,
    url: &str,
    target: &Path,
    telemetry: &TransferTelemetry,
) -> Result<u64, DownloadError> {
    let temp = temp_path(target);
    match tokio::fs::remove_file(&temp).await {
        Ok(()) => debug!(path = %temp.display(), "removed stale temporary file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DownloadError::io(&temp, e)),
    }

    let bytes = client.fetch_to_path(url, &temp, telemetry).await?;
    tokio::fs::rename(&temp, target)
        .await
        .map_err(|e| DownloadError::io(target, e))?;
    Ok(bytes)
}

/// Download phase: fetches every planned record, one at a time.
///
/// Callers pass only records that should be downloaded. Cancellation is
/// checked before each record, never during a transfer.
///
/// # Errors
///
/// Returns [`PipelineError::Cancelled`] when the token fires. Per-record
/// failures are counted, not returned.
#[instrument(skip_all, fields(planned = records.len(), dir = %download_dir.display()))]
pub async fn download_planned(
    store: &dyn CatalogStore,
    client: &HttpClient,
    records: &[CatalogRecord],
    download_dir: &Path,
    telemetry: &TransferTelemetry,
    cancel: &CancellationToken,
) -> Result<DownloadStats, PipelineError> {
    let mut stats = DownloadStats::default();
    for record in records {
        if cancel.is_cancelled() {
            info!(
                completed = stats.completed,
                failed = stats.failed,
                "download phase cancelled"
            );
            return Err(PipelineError::Cancelled);
        }
        match download_one(store, client, record, download_dir, telemetry).await {
            Ok(_) => stats.completed += 1,
            Err(error) => {
                warn!(save_name = %record.save_name, error = %error, "download failed");
                stats.failed += 1;
            }
        }
    }
    info!(
        completed = stats.completed,
        failed = stats.failed,
        "download phase finished"
    );
    Ok(stats)
}
