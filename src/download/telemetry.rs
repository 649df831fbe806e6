//! Live transfer telemetry shared with whatever renders progress.
//!
//! The downloader is the only writer. Readers call
//! [`TransferTelemetry::snapshot`] on their own schedule; nothing here calls
//! back into the presentation side.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::io::AsyncWrite;

/// Shortest span a throughput sample is measured over.
const RATE_WINDOW_MS: u64 = 100;

#[derive(Debug)]
struct TelemetryState {
    origin: Instant,
    file_name: RwLock<String>,
    bytes_copied: AtomicU64,
    total_bytes: AtomicU64,
    updated_at_ms: AtomicU64,
    bytes_per_sec: AtomicU64,
    window_started_ms: AtomicU64,
    window_bytes: AtomicU64,
}

/// Point-in-time copy of the transfer counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// File currently being written (final name, not the temporary one).
    pub file_name: String,
    /// Bytes written so far for this file.
    pub bytes_copied: u64,
    /// Announced size, 0 when unknown.
    pub total_bytes: u64,
    /// Milliseconds since the telemetry was created, at the last update.
    pub updated_at_ms: u64,
    /// Throughput over the most recent measurement window.
    pub bytes_per_sec: u64,
}

impl TelemetrySnapshot {
    /// Completed fraction in `0.0..=1.0`, or `None` when the size is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> Option<f64> {
        (self.total_bytes > 0)
            .then(|| (self.bytes_copied as f64 / self.total_bytes as f64).min(1.0))
    }
}

/// Cheaply cloneable handle to the shared counters.
#[derive(Debug, Clone)]
pub struct TransferTelemetry {
    state: Arc<TelemetryState>,
}

impl Default for TransferTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferTelemetry {
    /// Creates zeroed telemetry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(TelemetryState {
                origin: Instant::now(),
                file_name: RwLock::new(String::new()),
                bytes_copied: AtomicU64::new(0),
                total_bytes: AtomicU64::new(0),
                updated_at_ms: AtomicU64::new(0),
                bytes_per_sec: AtomicU64::new(0),
                window_started_ms: AtomicU64::new(0),
                window_bytes: AtomicU64::new(0),
            }),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.state.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Resets the counters for a new file.
    pub fn begin(&self, file_name: &str, total_bytes: Option<u64>) {
        {
            let mut name = self
                .state
                .file_name
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            name.clear();
            name.push_str(file_name);
        }
        self.state.bytes_copied.store(0, Ordering::Relaxed);
        self.state
            .total_bytes
            .store(total_bytes.unwrap_or(0), Ordering::Relaxed);
        self.state.bytes_per_sec.store(0, Ordering::Relaxed);
        self.state.window_bytes.store(0, Ordering::Relaxed);
        let now = self.now_ms();
        self.state.window_started_ms.store(now, Ordering::Relaxed);
        self.state.updated_at_ms.store(now, Ordering::Relaxed);
    }

    /// Accounts for `bytes` just written.
    ///
    /// Bytes accumulate in the current window; once it spans at least
    /// `RATE_WINDOW_MS`, throughput is the window's bytes over its length and
    /// a new window starts.
    pub fn record(&self, bytes: u64) {
        let now = self.now_ms();
        self.state.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
        self.state.updated_at_ms.store(now, Ordering::Relaxed);

        let window = self
            .state
            .window_bytes
            .fetch_add(bytes, Ordering::Relaxed)
            .saturating_add(bytes);
        let elapsed = now.saturating_sub(self.state.window_started_ms.load(Ordering::Relaxed));
        if elapsed >= RATE_WINDOW_MS {
            self.state
                .bytes_per_sec
                .store(window.saturating_mul(1000) / elapsed, Ordering::Relaxed);
            self.state.window_bytes.store(0, Ordering::Relaxed);
            self.state.window_started_ms.store(now, Ordering::Relaxed);
        }
    }

    /// Reads the current counters.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let file_name = self
            .state
            .file_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        TelemetrySnapshot {
            file_name,
            bytes_copied: self.state.bytes_copied.load(Ordering::Relaxed),
            total_bytes: self.state.total_bytes.load(Ordering::Relaxed),
            updated_at_ms: self.state.updated_at_ms.load(Ordering::Relaxed),
            bytes_per_sec: self.state.bytes_per_sec.load(Ordering::Relaxed),
        }
    }
}

/// Writer adapter that reports every successful write to [`TransferTelemetry`].
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    telemetry: TransferTelemetry,
}

impl<W> CountingWriter<W> {
    /// Wraps `inner`.
    pub fn new(inner: W, telemetry: TransferTelemetry) -> Self {
        Self { inner, telemetry }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = &poll {
            this.telemetry.record(*written as u64);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
