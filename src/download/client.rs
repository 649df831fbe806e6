//! HTTP client wrapper for streaming media files to disk.
//!
//! [`HttpClient`] is built once per run and reused for every record so
//! connections to the CDN are pooled.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, HeaderMap, HeaderValue, REFERER};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    ACCEPT_LANGUAGE_VALUE, CONNECT_TIMEOUT_SECS, FAILURE_STATUS_THRESHOLD, READ_TIMEOUT_SECS,
};
use super::error::DownloadError;
use super::telemetry::{CountingWriter, TransferTelemetry};
use crate::site::WEB_ORIGIN;
use crate::user_agent;

/// HTTP client for downloading media with streaming support.
///
/// # Example
///
/// ```no_run
/// use feedsync_core::download::{HttpClient, TransferTelemetry};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let telemetry = TransferTelemetry::new();
/// let bytes = client
///     .fetch_to_path("https://cdn.example/v.mp4", Path::new("./A.mp4.part"), &telemetry)
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the builder fails.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit connect and read timeouts.
    ///
    /// Requests carry a browser identity, `Accept`, `Accept-Language` and a
    /// site `Referer`; the CDN refuses bare clients.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the builder fails.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
        headers.insert(REFERER, HeaderValue::from_static(WEB_ORIGIN));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .user_agent(user_agent::default_download_user_agent())
            .default_headers(headers)
            .build()
            .map_err(|source| DownloadError::Client { source })?;
        Ok(Self { client })
    }

    /// Streams `url` into `path`, truncating any existing file there.
    ///
    /// Every chunk is reported to `telemetry`. When the server announces a
    /// length, the written size must match it.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] for malformed URLs
    /// - [`DownloadError::Network`]/[`DownloadError::Timeout`] for transport failures
    /// - [`DownloadError::HttpStatus`] for statuses at or above 300
    /// - [`DownloadError::Io`] when the file cannot be written
    /// - [`DownloadError::Integrity`] on a length mismatch
    #[instrument(skip(self, telemetry), fields(url = %url, path = %path.display()))]
    pub async fn fetch_to_path(
        &self,
        url: &str,
        path: &Path,
        telemetry: &TransferTelemetry,
    ) -> Result<u64, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status().as_u16();
        if status >= FAILURE_STATUS_THRESHOLD {
            return Err(DownloadError::http_status(url, status));
        }

        let content_length = announced_length(&response);
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().trim_end_matches(super::TEMP_SUFFIX).to_string())
            .unwrap_or_default();
        telemetry.begin(&display_name, content_length);
        debug!(?content_length, "response accepted, streaming body");

        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        let bytes_written = stream_to_file(file, response, url, path, telemetry).await?;

        if let Some(expected) = content_length
            && expected != bytes_written
        {
            return Err(DownloadError::integrity(path, expected, bytes_written));
        }

        info!(bytes = bytes_written, "transfer complete");
        Ok(bytes_written)
    }
}

fn announced_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

/// Streams the response body through a counting writer, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    telemetry: &TransferTelemetry,
) -> Result<u64, DownloadError> {
    let mut writer = CountingWriter::new(BufWriter::new(file), telemetry.clone());
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
