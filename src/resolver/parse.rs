//! Parse strategy: video id from the page address, direct URL from a service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{ResolveError, UrlStrategy};
use crate::catalog::{CatalogRecord, UrlField};
use crate::site::{VIDEO_ID_SOURCE, video_id_from_web_url};
use crate::user_agent;

/// Path of the parse endpoint, relative to the service base URL.
const PARSE_PATH: &str = "/video/id/parse";

/// Service `code` meaning success.
const SUCCESS_CODE: i64 = 200;

/// Translates a site video id into a direct file URL.
#[async_trait]
pub trait VideoIdResolver: Send + Sync {
    /// Resolves `video_id` from the site identified by `source`.
    async fn resolve(&self, source: &str, video_id: &str) -> Result<String, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<ParseData>,
}

#[derive(Debug, Deserialize)]
struct ParseData {
    #[serde(default)]
    video_url: String,
}

/// HTTP client for a parse-video service.
///
/// Calls `GET {base}/video/id/parse?source=<source>&video_id=<id>` and reads
/// `data.video_url` from a `{"code":200,"msg":..,"data":{..}}` envelope.
#[derive(Debug, Clone)]
pub struct ParseServiceClient {
    client: Client,
    base_url: String,
}

impl ParseServiceClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(user_agent::default_resolver_user_agent())
            .build()
            .map_err(|e| ResolveError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn request_url(&self, source: &str, video_id: &str) -> Result<Url, ResolveError> {
        let mut url = Url::parse(&format!("{}{PARSE_PATH}", self.base_url))
            .map_err(|e| ResolveError::Client(format!("invalid parse service URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("source", source)
            .append_pair("video_id", video_id);
        Ok(url)
    }
}

#[async_trait]
impl VideoIdResolver for ParseServiceClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn resolve(&self, source: &str, video_id: &str) -> Result<String, ResolveError> {
        let url = self.request_url(source, video_id)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ResolveError::transport(url.as_str(), e))?;
        let status = response.status();
        let body: ParseResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::transport(url.as_str(), e))?;

        if body.code != SUCCESS_CODE {
            return Err(ResolveError::Service {
                video_id: video_id.to_string(),
                code: body.code,
                message: body.msg,
            });
        }
        let video_url = body.data.map(|d| d.video_url).unwrap_or_default();
        if video_url.is_empty() {
            return Err(ResolveError::Service {
                video_id: video_id.to_string(),
                code: body.code,
                message: "response carried no video_url".to_string(),
            });
        }
        debug!(http_status = status.as_u16(), "video id resolved");
        Ok(video_url)
    }
}

/// Fills `web_download_url` through a [`VideoIdResolver`].
pub struct IdParseStrategy {
    resolver: Box<dyn VideoIdResolver>,
}

impl IdParseStrategy {
    /// Wraps an ID resolver.
    #[must_use]
    pub fn new(resolver: Box<dyn VideoIdResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl UrlStrategy for IdParseStrategy {
    fn name(&self) -> &'static str {
        "parse"
    }

    fn target(&self) -> UrlField {
        UrlField::Web
    }

    async fn resolve(&self, record: &CatalogRecord) -> Result<String, ResolveError> {
        let video_id =
            video_id_from_web_url(&record.web_url).ok_or_else(|| ResolveError::NoVideoId {
                web_url: record.web_url.clone(),
            })?;
        self.resolver.resolve(VIDEO_ID_SOURCE, &video_id).await
    }
}
