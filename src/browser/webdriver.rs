//! W3C WebDriver client (chromedriver) implementing the rendering seam.
//!
//! Each session is a `POST /session` with Chrome options for headless mode and
//! the requested user agent. Page interaction goes through
//! `POST /session/{id}/execute/sync` so no element handles are kept around.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument, warn};

use super::{BrowserError, PageBrowser, PageSession, SessionOptions};

/// Extra time on top of the session timeout for each HTTP command.
const COMMAND_GRACE: Duration = Duration::from_secs(30);

/// Interval between visibility checks.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const VISIBLE_SCRIPT: &str = r"
const el = document.querySelector(arguments[0]);
if (!el) { return false; }
const style = window.getComputedStyle(el);
const rect = el.getBoundingClientRect();
return style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0);
";

const OUTER_HTML_SCRIPT: &str = r"
const [selector, all] = arguments;
if (all) {
  const nodes = Array.from(document.querySelectorAll(selector));
  return nodes.length === 0 ? null : nodes.map((n) => n.outerHTML).join('');
}
const el = document.querySelector(selector);
return el ? el.outerHTML : null;
";

/// Browser driven through a WebDriver endpoint such as `http://localhost:9515`.
#[derive(Debug, Clone)]
pub struct WebDriverBrowser {
    client: Client,
    endpoint: String,
}

impl WebDriverBrowser {
    /// Creates a browser client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Client`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BrowserError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the endpoint this browser talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn chrome_capabilities(options: &SessionOptions) -> Value {
    let mut args = vec![
        format!("--user-agent={}", options.user_agent),
        "--disable-gpu".to_string(),
        "--no-first-run".to_string(),
    ];
    if options.headless {
        args.push("--headless=new".to_string());
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": "normal",
                "goog:chromeOptions": { "args": args }
            }
        }
    })
}

/// Sends one WebDriver command and unwraps the `value` member.
async fn command(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    timeout: Duration,
    name: &str,
) -> Result<Value, BrowserError> {
    let mut request = client.request(method, url).timeout(timeout);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.map_err(|e| BrowserError::Transport {
        url: url.to_string(),
        source: e,
    })?;
    let status = response.status();
    let payload: Value = response.json().await.map_err(|e| BrowserError::Transport {
        url: url.to_string(),
        source: e,
    })?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(BrowserError::Command {
            command: name.to_string(),
            message: format!("{error} (HTTP {}): {message}", status.as_u16()),
        });
    }
    Ok(value)
}

#[async_trait]
impl PageBrowser for WebDriverBrowser {
    #[instrument(skip(self, options), fields(endpoint = %self.endpoint, headless = options.headless))]
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError> {
        let url = format!("{}/session", self.endpoint);
        let value = command(
            &self.client,
            Method::POST,
            &url,
            Some(chrome_capabilities(options)),
            options.timeout + COMMAND_GRACE,
            "new session",
        )
        .await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Command {
                command: "new session".to_string(),
                message: "response carried no sessionId".to_string(),
            })?;
        debug!(session_id, "webdriver session opened");

        let session = WebDriverSession {
            client: self.client.clone(),
            base: format!("{}/session/{session_id}", self.endpoint),
            timeout: options.timeout,
        };

        let millis = u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX);
        session
            .send(
                Method::POST,
                "/timeouts",
                Some(json!({ "pageLoad": millis, "script": millis })),
                "set timeouts",
            )
            .await?;

        Ok(Box::new(session))
    }
}

struct WebDriverSession {
    client: Client,
    base: String,
    timeout: Duration,
}

impl WebDriverSession {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        name: &str,
    ) -> Result<Value, BrowserError> {
        let url = format!("{}{path}", self.base);
        command(
            &self.client,
            method,
            &url,
            body,
            self.timeout + COMMAND_GRACE,
            name,
        )
        .await
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value, BrowserError> {
        self.send(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
            "execute script",
        )
        .await
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.send(Method::POST, "/url", Some(json!({ "url": url })), "navigate")
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let visible = self.execute(VISIBLE_SCRIPT, json!([selector])).await?;
            if visible.as_bool() == Some(true) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: format!("{selector} to become visible"),
                    timeout: self.timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        self.execute(script, json!([])).await
    }

    async fn outer_html(&self, selector: &str, all: bool) -> Result<String, BrowserError> {
        let value = self.execute(OUTER_HTML_SCRIPT, json!([selector, all])).await?;
        match value {
            Value::String(markup) => Ok(markup),
            _ => Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }),
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let result = self.send(Method::DELETE, "", None, "delete session").await;
        if let Err(error) = &result {
            warn!(error = %error, "failed to close webdriver session");
        }
        result.map(|_| ())
    }
}
