//! Catalog record types.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which resolved download URL a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlField {
    /// `web_download_url`, filled by the parse strategy.
    Web,
    /// `mobile_download_url`, filled by the render strategy.
    Mobile,
}

impl UrlField {
    /// Returns the database column name for this field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web_download_url",
            Self::Mobile => "mobile_download_url",
        }
    }
}

/// A record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCatalogRecord {
    /// Canonical desktop page address (unique key).
    pub web_url: String,
    /// Mobile page address derived from `web_url`.
    pub mobile_url: String,
    /// Title exactly as scraped.
    pub origin_name: String,
    /// File-safe, de-duplicated name used for the output file.
    pub save_name: String,
}

/// One persisted feed item.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct CatalogRecord {
    /// Surrogate id.
    pub id: i64,
    /// Canonical desktop page address (unique key).
    pub web_url: String,
    /// Mobile page address, empty when unknown.
    pub mobile_url: String,
    /// Title exactly as scraped; never changes.
    pub origin_name: String,
    /// Output file stem; assigned at creation and never regenerated.
    pub save_name: String,
    /// Direct file URL from the parse strategy; empty until resolved.
    pub web_download_url: String,
    /// Direct file URL from the render strategy; empty until resolved.
    pub mobile_download_url: String,
    /// Manual override: false keeps the record out of the download phase.
    pub need_download: bool,
    /// Last resolution failure text (advisory).
    pub resolve_error: String,
    /// Last download failure text (advisory).
    pub download_error: String,
    /// When the record was created.
    pub created_at: String,
    /// When the record was last updated.
    pub updated_at: String,
}

impl CatalogRecord {
    /// Returns the resolved URL stored in `field` (may be empty).
    #[must_use]
    pub fn download_url(&self, field: UrlField) -> &str {
        match field {
            UrlField::Web => &self.web_download_url,
            UrlField::Mobile => &self.mobile_download_url,
        }
    }

    /// Fills `field` only when it is still empty. Returns whether it was written.
    ///
    /// Resolved URLs are sticky: a later pass never replaces an earlier success.
    pub fn fill_download_url(&mut self, field: UrlField, url: impl Into<String>) -> bool {
        let url = url.into();
        if url.is_empty() {
            return false;
        }
        let slot = match field {
            UrlField::Web => &mut self.web_download_url,
            UrlField::Mobile => &mut self.mobile_download_url,
        };
        if !slot.is_empty() {
            return false;
        }
        *slot = url;
        true
    }
}

#[cfg(test)]
pub(crate) fn sample_record(id: i64, save_name: &str) -> CatalogRecord {
    CatalogRecord {
        id,
        web_url: format!("https://www.ixigua.com/{id}"),
        mobile_url: format!("https://m.ixigua.com/video/{id}"),
        origin_name: save_name.to_string(),
        save_name: save_name.to_string(),
        web_download_url: String::new(),
        mobile_download_url: String::new(),
        need_download: true,
        resolve_error: String::new(),
        download_error: String::new(),
        created_at: String::new(),
        updated_at: String::new(),
    }
}
