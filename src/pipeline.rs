//! Phase runner: discovery, resolution and download in order.
//!
//! Every phase is optional and independently re-runnable; the runner only
//! decides which ones to run from the configuration and shares one
//! cancellation token between them.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::browser::{PageBrowser, WebDriverBrowser};
use crate::catalog::CatalogStore;
use crate::config::PipelineConfig;
use crate::discovery::{DiscoveryOptions, discover};
use crate::download::{DownloadStats, HttpClient, TransferTelemetry, download_planned};
use crate::error::PipelineError;
use crate::planner::plan;
use crate::resolver::{
    IdParseStrategy, ParseServiceClient, RenderStrategy, ResolveStats, StrategySet,
};
use crate::site::{Pause, SCROLL_PAUSE};

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Records inserted by discovery, when it ran.
    pub discovered: Option<usize>,
    /// Resolution counts, when it ran.
    pub resolution: Option<ResolveStats>,
    /// Records without a published file, when downloads were planned.
    pub planned: Option<usize>,
    /// Planned records skipped by the manual override.
    pub excluded: usize,
    /// Download counts, when it ran.
    pub download: Option<DownloadStats>,
    /// The run stopped early on operator request.
    pub cancelled: bool,
}

/// Collaborators shared by the phases of one run.
pub struct Pipeline {
    store: Arc<dyn CatalogStore>,
    browser: Arc<dyn PageBrowser>,
    strategies: StrategySet,
    http: HttpClient,
    telemetry: TransferTelemetry,
    scroll_pause: Pause,
}

impl Pipeline {
    /// Assembles a pipeline from explicit collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn CatalogStore>,
        browser: Arc<dyn PageBrowser>,
        strategies: StrategySet,
        http: HttpClient,
    ) -> Self {
        Self {
            store,
            browser,
            strategies,
            http,
            telemetry: TransferTelemetry::new(),
            scroll_pause: SCROLL_PAUSE,
        }
    }

    /// Overrides the pause taken after each feed scroll.
    #[must_use]
    pub fn with_scroll_pause(mut self, pause: Pause) -> Self {
        self.scroll_pause = pause;
        self
    }

    /// Builds the production collaborators described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Navigation`], [`PipelineError::Strategy`] or
    /// [`PipelineError::Transport`] when the matching HTTP client cannot be built.
    pub fn from_config(
        config: &PipelineConfig,
        store: Arc<dyn CatalogStore>,
    ) -> Result<Self, PipelineError> {
        let browser: Arc<dyn PageBrowser> =
            Arc::new(WebDriverBrowser::new(config.webdriver_url.clone())?);
        let parse_client = ParseServiceClient::new(
            config.parse_service_url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            config.render_timeout(),
        )?;

        let mut strategies = StrategySet::new();
        strategies.register(Box::new(IdParseStrategy::new(Box::new(parse_client))));
        strategies.register(Box::new(RenderStrategy::new(
            Arc::clone(&browser),
            !config.show_browser,
            config.render_timeout(),
        )));

        let http = HttpClient::with_timeouts(config.connect_timeout_secs, config.read_timeout_secs)?;
        Ok(Self::new(store, browser, strategies, http))
    }

    /// Handle to the live download telemetry.
    #[must_use]
    pub fn telemetry(&self) -> TransferTelemetry {
        self.telemetry.clone()
    }

    /// Runs the enabled phases in order.
    ///
    /// Cancellation ends the run with `cancelled = true` in the report and is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns the first phase-level failure: invalid configuration, an
    /// unreadable catalog or directory, or a feed that never ended.
    #[instrument(skip_all, fields(discover = config.get_url, resolve = config.fill_url, download = config.download))]
    pub async fn run(
        &self,
        config: &PipelineConfig,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport, PipelineError> {
        config.validate()?;
        let mut report = PipelineReport::default();

        match self.run_phases(config, cancel, &mut report).await {
            Ok(()) => {}
            Err(PipelineError::Cancelled) => {
                warn!("run cancelled, progress so far is saved");
                report.cancelled = true;
            }
            Err(error) => return Err(error),
        }

        info!(
            discovered = ?report.discovered,
            resolved = ?report.resolution.map(|s| s.filled),
            planned = ?report.planned,
            downloaded = ?report.download.map(|s| s.completed),
            failed_downloads = ?report.download.map(|s| s.failed),
            cancelled = report.cancelled,
            "run summary"
        );
        Ok(report)
    }

    async fn run_phases(
        &self,
        config: &PipelineConfig,
        cancel: &CancellationToken,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let store = self.store.as_ref();

        if config.get_url {
            let mut options = DiscoveryOptions::from_config(config)?;
            options.scroll_pause = self.scroll_pause;
            let inserted = discover(store, self.browser.as_ref(), &options, cancel).await?;
            report.discovered = Some(inserted);
        }

        if config.fill_url {
            report.resolution = Some(self.strategies.resolve_all(store, cancel).await?);
        }

        if config.download {
            let dir = config.require_download_path()?;
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PipelineError::filesystem(dir, e))?;

            let planned = plan(store, dir).await?;
            report.planned = Some(planned.pending.len());
            report.excluded = planned.excluded_count();
            let actionable = planned.into_actionable();
            info!(
                actionable = actionable.len(),
                excluded = report.excluded,
                "download plan ready"
            );

            let stats =
                download_planned(store, &self.http, &actionable, dir, &self.telemetry, cancel)
                    .await?;
            report.download = Some(stats);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeBrowser;
    use crate::catalog::{Catalog, NewCatalogRecord};
    use crate::config::ConfigError;
    use crate::db::Database;
    use crate::site::{FEED_END_MARKER, FEED_FOOTER_SELECTOR, FEED_LIST_SELECTOR};
    use tempfile::TempDir;

    async fn pipeline(browser: &FakeBrowser) -> (Pipeline, Catalog) {
        let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
        let pipeline = Pipeline::new(
            Arc::new(catalog.clone()),
            Arc::new(browser.clone()),
            StrategySet::new(),
            HttpClient::new().unwrap(),
        )
        .with_scroll_pause(Pause::none());
        (pipeline, catalog)
    }

    #[tokio::test]
    async fn test_nothing_enabled_is_a_noop() {
        let browser = FakeBrowser::default();
        let (pipeline, _) = pipeline(&browser).await;
        let report = pipeline
            .run(&PipelineConfig::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report, PipelineReport::default());
        assert!(browser.log().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_before_any_phase() {
        let browser = FakeBrowser::default();
        let (pipeline, _) = pipeline(&browser).await;
        let config = PipelineConfig {
            get_url: true,
            ..PipelineConfig::default()
        };
        let err = pipeline.run(&config, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(ConfigError::Missing { field: "targetUrl" })
        ));
    }

    #[tokio::test]
    async fn test_discovery_then_plan_with_existing_file() {
        let browser = FakeBrowser::default();
        browser.answer(FEED_FOOTER_SELECTOR, &[FEED_END_MARKER]);
        browser.answer(
            FEED_LIST_SELECTOR,
            &[r#"<div class="userDetailV3__main__list">
                <div class="HorizontalFeedCard__contentWrapper"><div><a href="/1" title="A"></a></div></div>
                <div class="HorizontalFeedCard__contentWrapper"><div><a href="/2" title="B"></a></div></div>
            </div>"#],
        );
        let (pipeline, catalog) = pipeline(&browser).await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A.mp4"), b"done").unwrap();
        let config = PipelineConfig {
            get_url: true,
            download: true,
            target_url: Some("https://www.ixigua.com/home/9/video/".into()),
            download_path: Some(dir.path().to_path_buf()),
            max_scrolls: 3,
            ..PipelineConfig::default()
        };

        let report = pipeline.run(&config, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.discovered, Some(2));
        assert_eq!(report.planned, Some(1));
        // "B" has no resolved URL, so its download fails and is recorded.
        assert_eq!(report.download, Some(DownloadStats { completed: 0, failed: 1 }));
        let b = catalog
            .find_by_web_url("https://www.ixigua.com/2")
            .await
            .unwrap()
            .unwrap();
        assert!(b.download_error.contains("no download URL"));
    }

    #[tokio::test]
    async fn test_cancellation_is_reported_not_failed() {
        let browser = FakeBrowser::default();
        let (pipeline, catalog) = pipeline(&browser).await;
        catalog
            .insert(&NewCatalogRecord {
                web_url: "https://www.ixigua.com/1".into(),
                mobile_url: String::new(),
                origin_name: "A".into(),
                save_name: "A".into(),
            })
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let config = PipelineConfig {
            fill_url: true,
            ..PipelineConfig::default()
        };
        let report = pipeline.run(&config, &cancel).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.resolution, None);
    }
}
