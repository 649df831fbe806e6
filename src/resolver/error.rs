//! Error types for URL strategies.

use thiserror::Error;

use crate::browser::BrowserError;
use crate::html::HtmlError;

/// Why one strategy could not produce a direct URL for a record.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The page address carries no recognizable video id.
    #[error("no video id in {web_url}")]
    NoVideoId {
        /// Page address that was inspected.
        web_url: String,
    },

    /// The ID-resolution service could not be reached.
    #[error("parse service request to {url} failed: {source}")]
    Transport {
        /// Request URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The ID-resolution service answered with a failure.
    #[error("parse service rejected {video_id} (code {code}): {message}")]
    Service {
        /// Video id that was submitted.
        video_id: String,
        /// Service status code.
        code: i64,
        /// Service message.
        message: String,
    },

    /// The rendered page could not be driven.
    #[error("render failed: {0}")]
    Browser(#[from] BrowserError),

    /// Rendered markup could not be interpreted.
    #[error("markup error: {0}")]
    Markup(#[from] HtmlError),

    /// No playable media element appeared on the page.
    #[error("no media element found on {page_url}")]
    MediaNotFound {
        /// Page that was rendered.
        page_url: String,
    },

    /// A resolver client could not be constructed.
    #[error("failed to build resolver client: {0}")]
    Client(String),
}

impl ResolveError {
    /// Creates a transport error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates a media-not-found error.
    pub fn media_not_found(page_url: impl Into<String>) -> Self {
        Self::MediaNotFound {
            page_url: page_url.into(),
        }
    }
}
