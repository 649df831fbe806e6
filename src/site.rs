//! Fixed layout of the mirrored video site.
//!
//! Selectors, the end-of-feed footer text and the desktop/mobile address
//! scheme all live here so the phases stay free of site literals.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Desktop site origin; feed hrefs are relative to it.
pub const WEB_ORIGIN: &str = "https://www.ixigua.com";

/// Prefix of a canonical desktop page address.
const WEB_PAGE_PREFIX: &str = "https://www.ixigua.com/";

/// Prefix of the equivalent mobile page address.
const MOBILE_PAGE_PREFIX: &str = "https://m.ixigua.com/video/";

/// Source kind passed to the ID-resolution service.
pub const VIDEO_ID_SOURCE: &str = "xigua";

/// Rendered container that holds the feed cards.
pub const FEED_LIST_SELECTOR: &str = "div.userDetailV3__main__list";

/// Anchor inside each card carrying `href` and `title`.
pub const FEED_ITEM_SELECTOR: &str = "div.HorizontalFeedCard__contentWrapper > div > a";

/// Footer element re-inspected after each scroll.
pub const FEED_FOOTER_SELECTOR: &str = ".Feed-footer";

/// Footer markup once the feed has no more pages.
pub const FEED_END_MARKER: &str = "<div class=\"Feed-footer\">已经到底部，没有更多内容了</div>";

/// Element searched for on the mobile page.
pub const MEDIA_ELEMENT_SELECTOR: &str = "video";

/// Extension of every published file.
pub const MEDIA_EXTENSION: &str = ".mp4";

/// Pause between feed scrolls.
pub const SCROLL_PAUSE: Pause = Pause::between(Duration::from_secs(2), Duration::from_secs(3));

/// Pause after opening a mobile page, before inspecting it.
pub const RENDER_PAUSE: Pause = Pause::between(Duration::from_secs(2), Duration::from_secs(6));

/// Bounded randomized pause that keeps request pacing irregular.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pause {
    min: Duration,
    max: Duration,
}

impl Pause {
    /// Pause of a random length in `min..=max` (bounds are swapped if reversed).
    #[must_use]
    pub const fn between(min: Duration, max: Duration) -> Self {
        if min.as_nanos() <= max.as_nanos() {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No pause at all.
    #[must_use]
    pub const fn none() -> Self {
        Self::between(Duration::ZERO, Duration::ZERO)
    }

    /// Picks a length for one pause.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            self.min
        } else {
            rand::thread_rng().gen_range(self.min..=self.max)
        }
    }

    /// Sleeps for one sampled length. Returns false if `cancel` fired first.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let length = self.sample();
        if length.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(length) => true,
        }
    }
}

/// Builds the canonical desktop page address from a feed href.
#[must_use]
pub fn canonical_web_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if href.starts_with('/') {
        format!("{WEB_ORIGIN}{href}")
    } else {
        format!("{WEB_ORIGIN}/{href}")
    }
}

/// Rewrites a desktop page address to its mobile page address.
///
/// Addresses outside the desktop origin are returned unchanged.
#[must_use]
pub fn mobile_url_for(web_url: &str) -> String {
    web_url.replace(WEB_PAGE_PREFIX, MOBILE_PAGE_PREFIX)
}

/// Extracts the numeric video id: the first path segment of the page address.
#[must_use]
pub fn video_id_from_web_url(web_url: &str) -> Option<String> {
    let parsed = Url::parse(web_url).ok()?;
    let segment = parsed.path_segments()?.next()?;
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        Some(segment.to_string())
    } else {
        None
    }
}

/// Turns a `src` attribute into an absolute URL (the site serves `//host/...`).
#[must_use]
pub fn absolute_media_url(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src.to_string()
    }
}

/// Returns true when the rendered footer says the feed is exhausted.
#[must_use]
pub fn is_feed_end(footer_markup: &str) -> bool {
    footer_markup.trim() == FEED_END_MARKER
}
