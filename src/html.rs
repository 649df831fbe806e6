//! Extraction of feed entries and media sources from captured markup.

use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::site::FEED_ITEM_SELECTOR;

/// Markup that carries the playable file on the mobile page.
const MEDIA_SOURCE_SELECTOR: &str = "video[mediatype]";

/// Errors raised while querying captured markup.
#[derive(Debug, Error)]
pub enum HtmlError {
    /// A CSS selector failed to compile.
    #[error("invalid selector {selector:?}: {message}")]
    Selector {
        /// The selector text.
        selector: String,
        /// Parser message.
        message: String,
    },
}

/// One anchor from the feed listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLink {
    /// Raw `href` attribute (usually site-relative).
    pub href: String,
    /// Raw `title` attribute; empty when absent.
    pub title: String,
}

fn compile(selector: &str) -> Result<Selector, HtmlError> {
    Selector::parse(selector).map_err(|e| HtmlError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Extracts `(href, title)` pairs from the feed listing in document order.
///
/// Anchors without an `href` are skipped.
///
/// # Errors
///
/// Returns [`HtmlError::Selector`] if the feed selector does not compile.
pub fn extract_feed_links(markup: &str) -> Result<Vec<FeedLink>, HtmlError> {
    let selector = compile(FEED_ITEM_SELECTOR)?;
    let document = Html::parse_fragment(markup);

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href").filter(|h| !h.trim().is_empty()) else {
            debug!("skipping feed anchor without href");
            continue;
        };
        let title = element.value().attr("title").unwrap_or_default();
        links.push(FeedLink {
            href: href.trim().to_string(),
            title: title.to_string(),
        });
    }
    Ok(links)
}

/// Returns the `src` of the first `video` element marked with `mediatype`.
///
/// # Errors
///
/// Returns [`HtmlError::Selector`] if the media selector does not compile.
pub fn extract_media_source(markup: &str) -> Result<Option<String>, HtmlError> {
    let selector = compile(MEDIA_SOURCE_SELECTOR)?;
    let document = Html::parse_fragment(markup);

    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string))
}
