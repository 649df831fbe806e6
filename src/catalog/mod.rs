//! Durable catalog of discovered feed items.
//!
//! One row per unique `web_url`. Rows are created by discovery, enriched by
//! URL resolution and annotated by the downloader; nothing here deletes them.
//! Whether a file was already downloaded is not stored: the planner derives it
//! from the download directory.
//!
//! # Example
//!
//! ```ignore
//! use feedsync_core::catalog::{Catalog, NewCatalogRecord};
//! use feedsync_core::Database;
//!
//! let db = Database::new_in_memory().await?;
//! let catalog = Catalog::new(db);
//! catalog.insert(&NewCatalogRecord {
//!     web_url: "https://www.ixigua.com/7338043310168572427".into(),
//!     mobile_url: "https://m.ixigua.com/video/7338043310168572427".into(),
//!     origin_name: "Episode".into(),
//!     save_name: "Episode".into(),
//! }).await?;
//! ```

mod error;
mod record;
mod store;

pub use error::{CatalogDbErrorKind, CatalogError};
#[cfg(test)]
pub(crate) use record::sample_record;
pub use record::{CatalogRecord, NewCatalogRecord, UrlField};
pub use store::CatalogStore;

use sqlx::Row;
use tracing::instrument;

use crate::db::Database;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Returns `Ok(())` if at least one row was affected; otherwise [`CatalogError::RecordNotFound`].
fn check_affected(id: i64, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(CatalogError::RecordNotFound(id))
    } else {
        Ok(())
    }
}

/// `SQLite`-backed catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    /// Creates a catalog over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts one new record with `need_download = true` and empty URL/error fields.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the insert fails, including a
    /// `ConstraintViolation` when `web_url` already exists.
    #[instrument(skip(self, record), fields(web_url = %record.web_url, save_name = %record.save_name))]
    pub async fn insert(&self, record: &NewCatalogRecord) -> Result<i64> {
        let row = sqlx::query(
            r"INSERT INTO media_records (web_url, mobile_url, origin_name, save_name, need_download)
              VALUES (?, ?, ?, ?, 1)
              RETURNING id",
        )
        .bind(&record.web_url)
        .bind(&record.mobile_url)
        .bind(&record.origin_name)
        .bind(&record.save_name)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.get("id"))
    }

    /// Returns a record by surrogate id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<CatalogRecord>> {
        let record = sqlx::query_as::<_, CatalogRecord>("SELECT * FROM media_records WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(record)
    }

    /// Returns every record in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<CatalogRecord>> {
        let records =
            sqlx::query_as::<_, CatalogRecord>("SELECT * FROM media_records ORDER BY id ASC")
                .fetch_all(self.db.pool())
                .await?;
        Ok(records)
    }

    /// Writes back the mutable fields of `record`.
    ///
    /// `web_url`, `origin_name` and `save_name` are never rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::RecordNotFound`] if the id does not exist.
    /// Returns [`CatalogError::Database`] if the update fails.
    #[instrument(skip(self, record), fields(id = record.id, save_name = %record.save_name))]
    pub async fn update(&self, record: &CatalogRecord) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE media_records
              SET mobile_url = ?,
                  web_download_url = ?,
                  mobile_download_url = ?,
                  need_download = ?,
                  resolve_error = ?,
                  download_error = ?,
                  updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(&record.mobile_url)
        .bind(&record.web_download_url)
        .bind(&record.mobile_download_url)
        .bind(record.need_download)
        .bind(&record.resolve_error)
        .bind(&record.download_error)
        .bind(record.id)
        .execute(self.db.pool())
        .await?;

        check_affected(record.id, result.rows_affected())
    }

    /// Looks a record up by its canonical page address.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_by_web_url(&self, web_url: &str) -> Result<Option<CatalogRecord>> {
        let record =
            sqlx::query_as::<_, CatalogRecord>("SELECT * FROM media_records WHERE web_url = ?")
                .bind(web_url)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(record)
    }

    /// Returns records that still have a download URL one of the strategies could fill.
    ///
    /// A record qualifies when `web_download_url` is empty, or when
    /// `mobile_download_url` is empty and a mobile page is known.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_missing_download_urls(&self) -> Result<Vec<CatalogRecord>> {
        let records = sqlx::query_as::<_, CatalogRecord>(
            r"SELECT * FROM media_records
              WHERE length(web_download_url) = 0
                 OR (length(mobile_download_url) = 0 AND length(mobile_url) > 0)
              ORDER BY id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    /// Overwrites the advisory download error for one record.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::RecordNotFound`] if the id does not exist.
    /// Returns [`CatalogError::Database`] if the update fails.
    #[instrument(skip(self, message))]
    pub async fn record_download_error(&self, id: i64, message: &str) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE media_records
              SET download_error = ?, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(message)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_affected(id, result.rows_affected())
    }

    /// Sets the manual download override for one record.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::RecordNotFound`] if the id does not exist.
    /// Returns [`CatalogError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn set_need_download(&self, id: i64, need_download: bool) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE media_records
              SET need_download = ?, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(need_download)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_affected(id, result.rows_affected())
    }

    /// Returns the number of records.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_records")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count.0)
    }
}
