//! Render strategy: open the mobile page and read the media element's source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ResolveError, UrlStrategy};
use crate::browser::{BrowserError, PageBrowser, PageSession, SessionOptions};
use crate::catalog::{CatalogRecord, UrlField};
use crate::html::extract_media_source;
use crate::site::{MEDIA_ELEMENT_SELECTOR, Pause, RENDER_PAUSE, absolute_media_url};
use crate::user_agent::MOBILE_BROWSER;

/// Fills `mobile_download_url` by rendering the mobile page.
pub struct RenderStrategy {
    browser: Arc<dyn PageBrowser>,
    headless: bool,
    timeout: Duration,
    pause: Pause,
}

impl RenderStrategy {
    /// Creates a strategy that renders through `browser`.
    #[must_use]
    pub fn new(browser: Arc<dyn PageBrowser>, headless: bool, timeout: Duration) -> Self {
        Self {
            browser,
            headless,
            timeout,
            pause: RENDER_PAUSE,
        }
    }

    /// Overrides the pause taken after navigation.
    #[must_use]
    pub fn with_pause(mut self, pause: Pause) -> Self {
        self.pause = pause;
        self
    }

    async fn inspect(&self, session: &dyn PageSession, page_url: &str) -> Result<String, ResolveError> {
        session.navigate(page_url).await?;
        tokio::time::sleep(self.pause.sample()).await;

        let markup = match session.outer_html(MEDIA_ELEMENT_SELECTOR, true).await {
            Ok(markup) => markup,
            Err(BrowserError::ElementNotFound { .. } | BrowserError::Timeout { .. }) => {
                return Err(ResolveError::media_not_found(page_url));
            }
            Err(error) => return Err(error.into()),
        };
        let src = extract_media_source(&markup)?
            .ok_or_else(|| ResolveError::media_not_found(page_url))?;
        Ok(absolute_media_url(&src))
    }
}

#[async_trait]
impl UrlStrategy for RenderStrategy {
    fn name(&self) -> &'static str {
        "render"
    }

    fn target(&self) -> UrlField {
        UrlField::Mobile
    }

    fn can_handle(&self, record: &CatalogRecord) -> bool {
        !record.mobile_url.is_empty() && record.mobile_download_url.is_empty()
    }

    async fn resolve(&self, record: &CatalogRecord) -> Result<String, ResolveError> {
        let options = SessionOptions::new(self.headless, MOBILE_BROWSER).with_timeout(self.timeout);
        let session = self.browser.open(&options).await?;

        let outcome = tokio::time::timeout(self.timeout, self.inspect(session.as_ref(), &record.mobile_url))
            .await
            .unwrap_or_else(|_| Err(ResolveError::media_not_found(&record.mobile_url)));

        if let Err(error) = session.close().await {
            warn!(error = %error, "failed to close render session");
        }
        if let Ok(url) = &outcome {
            debug!(url = %url, "media source found");
        }
        outcome
    }
}
