//! Phase-level error type.
//!
//! Per-record failures never surface here: they are logged, written into the
//! record's advisory error field, and the phase moves on. A `PipelineError`
//! means the phase itself stopped.

use std::path::PathBuf;

use thiserror::Error;

use crate::browser::BrowserError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::db::DbError;
use crate::download::DownloadError;
use crate::html::HtmlError;
use crate::resolver::ResolveError;

/// Errors that abort a phase.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The rendering collaborator could not load or drive a page.
    #[error("navigation failed: {0}")]
    Navigation(#[from] BrowserError),

    /// Captured markup could not be interpreted.
    #[error("parse error: {0}")]
    Parse(#[from] HtmlError),

    /// Every URL strategy failed for a record.
    #[error("resolution failed for {web_url}: {message}")]
    Resolution {
        /// Page address of the record.
        web_url: String,
        /// Combined strategy failure text.
        message: String,
    },

    /// A resolution strategy could not be set up.
    #[error("resolver setup failed: {0}")]
    Strategy(#[from] ResolveError),

    /// HTTP failure, or a download client that cannot be built.
    #[error("transport error: {0}")]
    Transport(#[from] DownloadError),

    /// The catalog could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(#[from] CatalogError),

    /// The catalog database could not be opened.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// A local directory could not be listed or created.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The end-of-feed marker never appeared within the scroll guard.
    #[error("end of feed not detected after {scrolls} scrolls")]
    FeedEndNotDetected {
        /// Scrolls performed before giving up.
        scrolls: u32,
    },

    /// The operator asked the run to stop.
    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Creates a filesystem error.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Returns true for an operator stop, which is not a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
