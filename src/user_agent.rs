//! Device identities announced to the mirrored site.
//!
//! The feed and the CDN both vary their answers by user agent: the desktop
//! identity gets the scrolling feed, the mobile identity gets the lightweight
//! page that exposes a plain `video` element.

/// Desktop browser identity used for the feed page.
pub const DESKTOP_BROWSER: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Mobile browser identity used for the render strategy.
pub const MOBILE_BROWSER: &str = "Mozilla/5.0 (Linux; Android 6.0; Nexus 5 Build/MRA58N) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Mobile Safari/537.36";

/// User agent for media downloads.
///
/// The CDN rejects non-browser agents, so this is the desktop identity.
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    DESKTOP_BROWSER.to_string()
}

/// User agent for calls to the ID-resolution service.
#[must_use]
pub(crate) fn default_resolver_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("feedsync/{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_identity_is_mobile() {
        assert!(MOBILE_BROWSER.contains("Mobile"));
        assert!(!DESKTOP_BROWSER.contains("Mobile"));
    }

    #[test]
    fn test_download_identity_looks_like_a_browser() {
        assert!(default_download_user_agent().starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_resolver_identity_carries_version() {
        let ua = default_resolver_user_agent();
        assert_eq!(
            ua.strip_prefix("feedsync/"),
            Some(env!("CARGO_PKG_VERSION"))
        );
    }
}
