//! Discovery scanner: scroll the feed to its end and catalog new items.
//!
//! Dedup is by canonical `web_url`. Each new record is inserted on its own,
//! so a failed insert only loses that item.

use std::collections::HashSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::browser::{BrowserError, PageBrowser, PageSession, SessionOptions};
use crate::catalog::{CatalogStore, NewCatalogRecord};
use crate::config::{ConfigError, PipelineConfig};
use crate::error::PipelineError;
use crate::html::{FeedLink, extract_feed_links};
use crate::naming::{NameResolver, Substitutions};
use crate::site::{
    FEED_FOOTER_SELECTOR, FEED_LIST_SELECTOR, Pause, SCROLL_PAUSE, canonical_web_url,
    is_feed_end, mobile_url_for,
};
use crate::user_agent::DESKTOP_BROWSER;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight); return true;";

/// Inputs of one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Feed page address.
    pub target_url: String,
    /// Run the browser without a window.
    pub headless: bool,
    /// Scroll-loop guard.
    pub max_scrolls: u32,
    /// Bound on waits inside the feed page.
    pub render_timeout: Duration,
    /// Pause after each scroll.
    pub scroll_pause: Pause,
    /// Title substitutions for save names.
    pub substitutions: Substitutions,
}

impl DiscoveryOptions {
    /// Extracts discovery inputs from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `targetUrl` is unset.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            target_url: config.require_target_url()?.to_string(),
            headless: !config.show_browser,
            max_scrolls: config.max_scrolls,
            render_timeout: config.render_timeout(),
            scroll_pause: SCROLL_PAUSE,
            substitutions: config.replace.clone(),
        })
    }
}

/// Scrolls until the footer shows the end-of-feed marker.
///
/// Returns the number of scrolls performed. A missing footer counts as "not
/// yet"; the guard turns an endless feed into
/// [`PipelineError::FeedEndNotDetected`].
///
/// # Errors
///
/// - [`PipelineError::Cancelled`] when `cancel` fires
/// - [`PipelineError::Navigation`] when the page cannot be driven
/// - [`PipelineError::FeedEndNotDetected`] after `max_scrolls` scrolls
pub async fn scroll_to_end(
    session: &dyn PageSession,
    max_scrolls: u32,
    pause: Pause,
    cancel: &CancellationToken,
) -> Result<u32, PipelineError> {
    for scroll in 1..=max_scrolls {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        session.evaluate(SCROLL_TO_BOTTOM).await?;
        if !pause.wait(cancel).await {
            return Err(PipelineError::Cancelled);
        }

        match session.outer_html(FEED_FOOTER_SELECTOR, false).await {
            Ok(footer) if is_feed_end(&footer) => {
                debug!(scrolls = scroll, "end of feed reached");
                return Ok(scroll);
            }
            Ok(_) | Err(BrowserError::ElementNotFound { .. }) => {}
            Err(error) => return Err(error.into()),
        }
    }
    Err(PipelineError::FeedEndNotDetected {
        scrolls: max_scrolls,
    })
}

/// Inserts every link whose canonical address is not cataloged yet.
///
/// Save names continue the occurrence counts already in the catalog. Returns
/// the number of records inserted.
///
/// # Errors
///
/// Returns [`PipelineError::Persistence`] only if the catalog cannot be
/// listed; individual insert failures are logged and skipped.
#[instrument(skip_all, fields(links = links.len()))]
pub async fn ingest_listing(
    store: &dyn CatalogStore,
    links: &[FeedLink],
    substitutions: &Substitutions,
) -> Result<usize, PipelineError> {
    let existing = store.list_all().await?;
    let mut seen: HashSet<String> = existing.iter().map(|r| r.web_url.clone()).collect();
    let mut names = NameResolver::from_records(&existing, substitutions.clone());
    info!(
        extracted = links.len(),
        cataloged = existing.len(),
        "ingesting feed listing"
    );

    let mut inserted = 0;
    for link in links {
        let web_url = canonical_web_url(&link.href);
        if seen.contains(&web_url) {
            debug!(web_url = %web_url, "already cataloged");
            continue;
        }

        let record = NewCatalogRecord {
            mobile_url: mobile_url_for(&web_url),
            origin_name: link.title.clone(),
            save_name: names.resolve(&link.title),
            web_url,
        };
        match store.insert(&record).await {
            Ok(id) => {
                debug!(id, web_url = %record.web_url, save_name = %record.save_name, "cataloged");
                seen.insert(record.web_url);
                inserted += 1;
            }
            Err(error) => {
                warn!(web_url = %record.web_url, error = %error, "insert failed, skipping item");
            }
        }
    }

    info!(inserted, "discovery ingest finished");
    Ok(inserted)
}

/// Discovery phase: render the feed, scroll to its end, catalog new items.
///
/// Returns the number of records inserted.
///
/// # Errors
///
/// Any error from [`scroll_to_end`] or [`ingest_listing`], plus
/// [`PipelineError::Parse`] when the listing markup cannot be read.
#[instrument(skip_all, fields(target_url = %options.target_url))]
pub async fn discover(
    store: &dyn CatalogStore,
    browser: &dyn PageBrowser,
    options: &DiscoveryOptions,
    cancel: &CancellationToken,
) -> Result<usize, PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let session = browser
        .open(
            &SessionOptions::new(options.headless, DESKTOP_BROWSER)
                .with_timeout(options.render_timeout),
        )
        .await?;
    let listing = capture_listing(session.as_ref(), options, cancel).await;
    if let Err(error) = session.close().await {
        warn!(error = %error, "failed to close feed session");
    }
    let markup = listing?;

    let links = extract_feed_links(&markup)?;
    ingest_listing(store, &links, &options.substitutions).await
}

async fn capture_listing(
    session: &dyn PageSession,
    options: &DiscoveryOptions,
    cancel: &CancellationToken,
) -> Result<String, PipelineError> {
    session.navigate(&options.target_url).await?;
    session.wait_visible(FEED_LIST_SELECTOR).await?;
    let scrolls = scroll_to_end(session, options.max_scrolls, options.scroll_pause, cancel).await?;
    info!(scrolls, "feed fully loaded");
    Ok(session.outer_html(FEED_LIST_SELECTOR, true).await?)
}
