//! Repository seam for catalog persistence.
//!
//! Pipeline phases depend on this trait rather than on [`Catalog`] directly so
//! they can be driven against any store that provides single-write atomicity.

use async_trait::async_trait;

use super::{Catalog, CatalogRecord, NewCatalogRecord, Result};

/// Data-access contract consumed by the pipeline phases.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Persists one new record and returns its id.
    async fn insert(&self, record: &NewCatalogRecord) -> Result<i64>;

    /// Returns every record.
    async fn list_all(&self) -> Result<Vec<CatalogRecord>>;

    /// Writes back the mutable fields of a record.
    async fn update(&self, record: &CatalogRecord) -> Result<()>;

    /// Looks a record up by canonical page address.
    async fn find_by_web_url(&self, web_url: &str) -> Result<Option<CatalogRecord>>;

    /// Returns records with a download URL still open for resolution.
    async fn find_missing_download_urls(&self) -> Result<Vec<CatalogRecord>>;

    /// Overwrites the advisory download error.
    async fn record_download_error(&self, id: i64, message: &str) -> Result<()>;
}

#[async_trait]
impl CatalogStore for Catalog {
    async fn insert(&self, record: &NewCatalogRecord) -> Result<i64> {
        Catalog::insert(self, record).await
    }

    async fn list_all(&self) -> Result<Vec<CatalogRecord>> {
        Catalog::list_all(self).await
    }

    async fn update(&self, record: &CatalogRecord) -> Result<()> {
        Catalog::update(self, record).await
    }

    async fn find_by_web_url(&self, web_url: &str) -> Result<Option<CatalogRecord>> {
        Catalog::find_by_web_url(self, web_url).await
    }

    async fn find_missing_download_urls(&self) -> Result<Vec<CatalogRecord>> {
        Catalog::find_missing_download_urls(self).await
    }

    async fn record_download_error(&self, id: i64, message: &str) -> Result<()> {
        Catalog::record_download_error(self, id, message).await
    }
}
