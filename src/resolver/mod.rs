//! URL resolution: turn page addresses into direct media URLs.
//!
//! # Architecture
//!
//! - [`UrlStrategy`] - one way of obtaining a direct URL, bound to one record field
//! - [`IdParseStrategy`] - video id through a [`VideoIdResolver`] (fills `web_download_url`)
//! - [`RenderStrategy`] - rendered mobile page inspection (fills `mobile_download_url`)
//! - [`StrategySet`] - runs every applicable strategy per record and merges outcomes
//!
//! Strategies are independent: one failing never stops the other. A field
//! that already holds a URL is never re-resolved.

mod error;
mod parse;
mod render;

pub use error::ResolveError;
pub use parse::{IdParseStrategy, ParseServiceClient, VideoIdResolver};
pub use render::RenderStrategy;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{CatalogRecord, CatalogStore, UrlField};
use crate::error::PipelineError;

/// One independent way of resolving a record's direct URL.
#[async_trait]
pub trait UrlStrategy: Send + Sync {
    /// Short name used in logs and error text.
    fn name(&self) -> &'static str;

    /// Record field this strategy fills.
    fn target(&self) -> UrlField;

    /// Returns true if the strategy should run for `record`.
    ///
    /// The default is "the target field is still empty".
    fn can_handle(&self, record: &CatalogRecord) -> bool {
        record.download_url(self.target()).is_empty()
    }

    /// Produces a direct URL for `record`.
    async fn resolve(&self, record: &CatalogRecord) -> Result<String, ResolveError>;
}

/// Counts from one resolution phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Records processed.
    pub attempted: usize,
    /// Fields newly filled across all records.
    pub filled: usize,
    /// Records where every attempted strategy failed.
    pub failed: usize,
}

/// Ordered collection of strategies.
#[derive(Default)]
pub struct StrategySet {
    strategies: Vec<Box<dyn UrlStrategy>>,
}

impl StrategySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a strategy.
    pub fn register(&mut self, strategy: Box<dyn UrlStrategy>) {
        debug!(name = strategy.name(), target = strategy.target().as_str(), "registering strategy");
        self.strategies.push(strategy);
    }

    /// Number of registered strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs every applicable strategy against `record` and merges the results.
    ///
    /// Successful URLs fill empty fields only. `resolve_error` gets the joined
    /// failure text when any strategy failed and is cleared otherwise.
    /// Returns how many fields were filled.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Resolution`] when every attempted strategy
    /// failed. The record has still been updated in memory.
    pub async fn resolve_record(&self, record: &mut CatalogRecord) -> Result<usize, PipelineError> {
        let mut attempted = 0;
        let mut filled = 0;
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            if !strategy.can_handle(record) {
                continue;
            }
            attempted += 1;
            match strategy.resolve(record).await {
                Ok(url) => {
                    if record.fill_download_url(strategy.target(), url) {
                        filled += 1;
                    }
                }
                Err(error) => {
                    debug!(strategy = strategy.name(), error = %error, "strategy failed");
                    failures.push(format!("{}: {error}", strategy.name()));
                }
            }
        }

        if attempted == 0 {
            return Ok(0);
        }
        record.resolve_error = failures.join("; ");
        if failures.len() == attempted {
            return Err(PipelineError::Resolution {
                web_url: record.web_url.clone(),
                message: record.resolve_error.clone(),
            });
        }
        Ok(filled)
    }

    /// Resolution phase: every record with an open URL field, one at a time.
    ///
    /// Each record is written back right after its attempt. Cancellation is
    /// checked before each record.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Persistence`] if the candidates cannot be listed
    /// - [`PipelineError::Cancelled`] when the token fires
    #[instrument(skip_all, fields(strategies = self.len()))]
    pub async fn resolve_all(
        &self,
        store: &dyn CatalogStore,
        cancel: &CancellationToken,
    ) -> Result<ResolveStats, PipelineError> {
        let records = store.find_missing_download_urls().await?;
        info!(candidates = records.len(), "resolving download URLs");

        let mut stats = ResolveStats::default();
        for mut record in records {
            if cancel.is_cancelled() {
                info!(
                    attempted = stats.attempted,
                    filled = stats.filled,
                    "resolution phase cancelled"
                );
                return Err(PipelineError::Cancelled);
            }
            stats.attempted += 1;

            match self.resolve_record(&mut record).await {
                Ok(filled) => stats.filled += filled,
                Err(error) => {
                    warn!(save_name = %record.save_name, error = %error, "no strategy succeeded");
                    stats.failed += 1;
                }
            }
            if let Err(error) = store.update(&record).await {
                warn!(id = record.id, error = %error, "failed to persist resolution result");
            }
        }

        info!(
            attempted = stats.attempted,
            filled = stats.filled,
            failed = stats.failed,
            "resolution phase finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, NewCatalogRecord, sample_record};
    use crate::db::Database;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        target: UrlField,
        answer: Result<&'static str, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn boxed(
            name: &'static str,
            target: UrlField,
            answer: Result<&'static str, &'static str>,
        ) -> (Box<dyn UrlStrategy>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let strategy = Self {
                name,
                target,
                answer,
                calls: Arc::clone(&calls),
            };
            (Box::new(strategy), calls)
        }
    }

    #[async_trait]
    impl UrlStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn target(&self) -> UrlField {
            self.target
        }

        async fn resolve(&self, record: &CatalogRecord) -> Result<String, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Ok(url) => Ok(url.to_string()),
                Err(_) => Err(ResolveError::media_not_found(&record.mobile_url)),
            }
        }
    }

    fn set(
        web: Result<&'static str, &'static str>,
        mobile: Result<&'static str, &'static str>,
    ) -> (StrategySet, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let mut strategies = StrategySet::new();
        let (parse, parse_calls) = Fixed::boxed("parse", UrlField::Web, web);
        let (render, render_calls) = Fixed::boxed("render", UrlField::Mobile, mobile);
        strategies.register(parse);
        strategies.register(render);
        (strategies, parse_calls, render_calls)
    }

    #[tokio::test]
    async fn test_both_strategies_fill_their_fields() {
        let (strategies, _, _) = set(Ok("https://cdn/web.mp4"), Ok("https://cdn/m.mp4"));
        let mut record = sample_record(1, "A");
        record.resolve_error = "stale".into();

        let filled = strategies.resolve_record(&mut record).await.unwrap();
        assert_eq!(filled, 2);
        assert_eq!(record.web_download_url, "https://cdn/web.mp4");
        assert_eq!(record.mobile_download_url, "https://cdn/m.mp4");
        assert_eq!(record.resolve_error, "");
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_other() {
        let (strategies, _, render_calls) = set(Err("down"), Ok("https://cdn/m.mp4"));
        let mut record = sample_record(1, "A");

        let filled = strategies.resolve_record(&mut record).await.unwrap();
        assert_eq!(filled, 1);
        assert_eq!(render_calls.load(Ordering::SeqCst), 1);
        assert_eq!(record.web_download_url, "");
        assert!(record.resolve_error.starts_with("parse: "), "{}", record.resolve_error);
    }

    #[tokio::test]
    async fn test_all_failures_are_combined() {
        let (strategies, _, _) = set(Err("a"), Err("b"));
        let mut record = sample_record(1, "A");

        let err = strategies.resolve_record(&mut record).await.unwrap_err();
        let PipelineError::Resolution { message, .. } = err else {
            panic!("unexpected error");
        };
        assert!(message.contains("parse: ") && message.contains("render: "), "{message}");
        assert_eq!(record.resolve_error, message);
    }

    #[tokio::test]
    async fn test_resolved_field_is_sticky() {
        let (strategies, parse_calls, _) = set(Ok("https://cdn/other.mp4"), Ok("https://cdn/m.mp4"));
        let mut record = sample_record(1, "A");
        record.web_download_url = "https://cdn/first.mp4".into();

        strategies.resolve_record(&mut record).await.unwrap();
        assert_eq!(record.web_download_url, "https://cdn/first.mp4");
        assert_eq!(parse_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_all_persists_each_record() {
        let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
        for id in 1..=2 {
            catalog
                .insert(&NewCatalogRecord {
                    web_url: format!("https://www.ixigua.com/{id}"),
                    mobile_url: format!("https://m.ixigua.com/video/{id}"),
                    origin_name: format!("N{id}"),
                    save_name: format!("N{id}"),
                })
                .await
                .unwrap();
        }
        let (strategies, _, _) = set(Ok("https://cdn/web.mp4"), Err("gone"));

        let stats = strategies
            .resolve_all(&catalog, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats, ResolveStats { attempted: 2, filled: 2, failed: 0 });

        for record in catalog.list_all().await.unwrap() {
            assert_eq!(record.web_download_url, "https://cdn/web.mp4");
            assert!(record.resolve_error.contains("render: "));
        }
        // Mobile slot is still open, so the records stay candidates.
        assert_eq!(catalog.find_missing_download_urls().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_all_stops_on_cancellation() {
        let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
        catalog
            .insert(&NewCatalogRecord {
                web_url: "https://www.ixigua.com/1".into(),
                mobile_url: String::new(),
                origin_name: "A".into(),
                save_name: "A".into(),
            })
            .await
            .unwrap();
        let (strategies, parse_calls, _) = set(Ok("https://cdn/web.mp4"), Ok("x"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = strategies.resolve_all(&catalog, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(parse_calls.load(Ordering::SeqCst), 0);
    }
}
