//! End-to-end pipeline runs against a scripted page browser and mock HTTP
//! services for ID resolution and media delivery.

mod support;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feedsync_core::browser::BrowserError;
use feedsync_core::catalog::Catalog;
use feedsync_core::resolver::{IdParseStrategy, ParseServiceClient, RenderStrategy};
use feedsync_core::site::{
    FEED_END_MARKER, FEED_FOOTER_SELECTOR, FEED_LIST_SELECTOR, MEDIA_ELEMENT_SELECTOR, Pause,
};
use feedsync_core::{
    Database, HttpClient, PageBrowser, PageSession, Pipeline, PipelineConfig, SessionOptions,
    StrategySet, Substitutions,
};
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = r#"<div class="userDetailV3__main__list">
    <div class="HorizontalFeedCard__contentWrapper"><div><a href="/101" title="Ep | Pilot"></a></div></div>
    <div class="HorizontalFeedCard__contentWrapper"><div><a href="/102" title="Ep | Pilot"></a></div></div>
    <div class="HorizontalFeedCard__contentWrapper"><div><a href="/101" title="Ep | Pilot"></a></div></div>
</div>"#;

/// Feed page with a finished listing; mobile pages carry a media element
/// pointing at the mock server.
#[derive(Clone)]
struct ScriptedSite {
    media_base: String,
    opened_agents: Arc<Mutex<Vec<String>>>,
}

struct ScriptedPage {
    media_base: String,
    current: Mutex<String>,
}

#[async_trait]
impl PageBrowser for ScriptedSite {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError> {
        self.opened_agents
            .lock()
            .unwrap()
            .push(options.user_agent.clone());
        Ok(Box::new(ScriptedPage {
            media_base: self.media_base.clone(),
            current: Mutex::new(String::new()),
        }))
    }
}

#[async_trait]
impl PageSession for ScriptedPage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        *self.current.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn wait_visible(&self, _selector: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Null)
    }

    async fn outer_html(&self, selector: &str, _all: bool) -> Result<String, BrowserError> {
        let current = self.current.lock().unwrap().clone();
        match selector {
            FEED_FOOTER_SELECTOR => Ok(FEED_END_MARKER.to_string()),
            FEED_LIST_SELECTOR => Ok(LISTING.to_string()),
            MEDIA_ELEMENT_SELECTOR => {
                let id = current.rsplit('/').next().unwrap_or_default();
                Ok(format!(
                    r#"<video mediatype="video" src="{}/m/{id}.mp4"></video>"#,
                    self.media_base
                ))
            }
            other => Err(BrowserError::ElementNotFound {
                selector: other.to_string(),
            }),
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

async fn mount_services(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/video/id/parse"))
        .and(query_param("video_id", "101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "msg": "ok",
            "data": { "video_url": format!("{}/w/101.mp4", server.uri()) }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/id/parse"))
        .and(query_param("video_id", "102"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 500,
            "msg": "video unavailable"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/101.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"web-101".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m/102.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mobile-102".to_vec()))
        .mount(server)
        .await;
}

fn pipeline(server: &MockServer, site: &ScriptedSite, catalog: &Catalog) -> Pipeline {
    let browser: Arc<dyn PageBrowser> = Arc::new(site.clone());
    let parse = ParseServiceClient::new(
        server.uri(),
        std::time::Duration::from_secs(5),
        std::time::Duration::from_secs(5),
    )
    .unwrap();

    let mut strategies = StrategySet::new();
    strategies.register(Box::new(IdParseStrategy::new(Box::new(parse))));
    strategies.register(Box::new(
        RenderStrategy::new(Arc::clone(&browser), true, std::time::Duration::from_secs(5))
            .with_pause(Pause::none()),
    ));

    Pipeline::new(
        Arc::new(catalog.clone()),
        browser,
        strategies,
        HttpClient::new().unwrap(),
    )
    .with_scroll_pause(Pause::none())
}

#[tokio::test]
async fn test_full_run_discovers_resolves_and_downloads() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_services(&server).await;

    let site = ScriptedSite {
        media_base: server.uri(),
        opened_agents: Arc::new(Mutex::new(Vec::new())),
    };
    let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        get_url: true,
        fill_url: true,
        download: true,
        target_url: Some("https://www.ixigua.com/home/42/video/".into()),
        download_path: Some(dir.path().join("media")),
        replace: Substitutions::new([(" | ", "-")]),
        ..PipelineConfig::default()
    };

    let report = pipeline(&server, &site, &catalog)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    // Duplicate anchor collapses; the repeated title gets an occurrence number.
    assert_eq!(report.discovered, Some(2));
    let media = dir.path().join("media");
    assert_eq!(std::fs::read(media.join("Ep-Pilot.mp4")).unwrap(), b"web-101");
    assert_eq!(std::fs::read(media.join("Ep-Pilot2.mp4")).unwrap(), b"mobile-102");
    assert_eq!(report.download.map(|s| (s.completed, s.failed)), Some((2, 0)));

    let second = catalog
        .find_by_web_url("https://www.ixigua.com/102")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.origin_name, "Ep | Pilot");
    assert_eq!(second.web_download_url, "");
    assert!(second.resolve_error.contains("video unavailable"), "{}", second.resolve_error);

    let agents = site.opened_agents.lock().unwrap().clone();
    assert!(agents[0].contains("Windows"), "feed is read as a desktop browser");
    assert!(agents[1..].iter().all(|ua| ua.contains("Mobile")));
}

/// A second identical run finds nothing new and downloads nothing.
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_services(&server).await;

    let site = ScriptedSite {
        media_base: server.uri(),
        opened_agents: Arc::new(Mutex::new(Vec::new())),
    };
    let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        get_url: true,
        fill_url: true,
        download: true,
        target_url: Some("https://www.ixigua.com/home/42/video/".into()),
        download_path: Some(dir.path().to_path_buf()),
        ..PipelineConfig::default()
    };
    let pipeline = pipeline(&server, &site, &catalog);

    pipeline.run(&config, &CancellationToken::new()).await.unwrap();
    let again = pipeline.run(&config, &CancellationToken::new()).await.unwrap();

    assert_eq!(again.discovered, Some(0));
    assert_eq!(again.planned, Some(0));
    assert_eq!(catalog.count().await.unwrap(), 2);
}
