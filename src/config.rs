//! Run configuration loaded from `conf.json`.
//!
//! The value is built once by the caller and passed into every phase; nothing
//! reads configuration implicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::naming::Substitutions;

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "conf.json";

/// Default `SQLite` catalog file.
pub const DEFAULT_STORE_PATH: &str = "feedsync.db";

/// Default upper bound on feed scrolls before giving up on the end marker.
pub const DEFAULT_MAX_SCROLLS: u32 = 500;

/// Default chromedriver endpoint.
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Default parse-service endpoint.
pub const DEFAULT_PARSE_SERVICE_URL: &str = "http://localhost:8080";

/// Default bound on waits inside a rendered page.
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 20;

/// Default HTTP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (large media files).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for this schema.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value required by an enabled phase is missing.
    #[error("missing required configuration `{field}`")]
    Missing {
        /// Config key as written in the file.
        field: &'static str,
    },

    /// A value is out of range.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        /// Config key as written in the file.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Catalog store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `SQLite` database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Run the discovery phase.
    pub get_url: bool,
    /// Run the URL resolution phase.
    pub fill_url: bool,
    /// Run the download phase.
    pub download: bool,
    /// Catalog location.
    pub store: StoreConfig,
    /// Title substitutions, applied in file order.
    pub replace: Substitutions,
    /// Show the browser window instead of running headless.
    pub show_browser: bool,
    /// Scroll-loop guard.
    pub max_scrolls: u32,
    /// Directory that receives published media files.
    pub download_path: Option<PathBuf>,
    /// Feed page to discover from.
    pub target_url: Option<String>,
    /// WebDriver endpoint.
    pub webdriver_url: String,
    /// ID-resolution service endpoint.
    pub parse_service_url: String,
    /// Bound on waits inside a rendered page, in seconds.
    pub render_timeout_secs: u64,
    /// HTTP connect timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout, in seconds.
    pub read_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            get_url: false,
            fill_url: false,
            download: false,
            store: StoreConfig::default(),
            replace: Substitutions::default(),
            show_browser: false,
            max_scrolls: DEFAULT_MAX_SCROLLS,
            download_path: None,
            target_url: None,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            parse_service_url: DEFAULT_PARSE_SERVICE_URL.to_string(),
            render_timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Parses configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the text does not match the schema.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Returns true when at least one phase is enabled.
    #[must_use]
    pub fn any_phase_enabled(&self) -> bool {
        self.get_url || self.fill_url || self.download
    }

    /// Feed page address, required by discovery.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when unset or blank.
    pub fn require_target_url(&self) -> Result<&str, ConfigError> {
        self.target_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing { field: "targetUrl" })
    }

    /// Output directory, required by the download phase.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when unset or empty.
    pub fn require_download_path(&self) -> Result<&Path, ConfigError> {
        self.download_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or(ConfigError::Missing {
                field: "downloadPath",
            })
    }

    /// Checks that every enabled phase has what it needs.
    ///
    /// # Errors
    ///
    /// Returns the first missing or out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.get_url {
            self.require_target_url()?;
            if self.max_scrolls == 0 {
                return Err(ConfigError::Invalid {
                    field: "maxScrolls",
                    message: "must be at least 1".to_string(),
                });
            }
        }
        if self.download {
            self.require_download_path()?;
        }
        validate_timeout_secs("renderTimeoutSecs", self.render_timeout_secs)?;
        validate_timeout_secs("connectTimeoutSecs", self.connect_timeout_secs)?;
        validate_timeout_secs("readTimeoutSecs", self.read_timeout_secs)?;
        Ok(())
    }

    /// Bound on waits inside a rendered page.
    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if (1..=3600).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("{value}, expected range 1..=3600"),
        })
    }
}
