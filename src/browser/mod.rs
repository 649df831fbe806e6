//! Page-rendering seam used by discovery and the render strategy.
//!
//! - [`PageBrowser`] opens sessions with a given device identity
//! - [`PageSession`] drives one rendered page
//! - [`WebDriverBrowser`] implements both over the W3C WebDriver protocol
//!
//! Phases only see the traits, so tests script page behaviour with fakes.

mod webdriver;

pub use webdriver::WebDriverBrowser;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Default bound for waits inside one session.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(20);

/// Options for opening a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Device identity announced to the site.
    pub user_agent: String,
    /// Upper bound for waits (visibility polling, page loads).
    pub timeout: Duration,
}

impl SessionOptions {
    /// Creates options with the default timeout.
    #[must_use]
    pub fn new(headless: bool, user_agent: impl Into<String>) -> Self {
        Self {
            headless,
            user_agent: user_agent.into(),
            timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }

    /// Overrides the wait bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Errors from the rendering collaborator.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// HTTP transport to the automation endpoint failed.
    #[error("browser transport error calling {url}: {source}")]
    Transport {
        /// Endpoint URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The automation endpoint rejected a command.
    #[error("browser command {command} failed: {message}")]
    Command {
        /// Command name.
        command: String,
        /// Error text reported by the endpoint.
        message: String,
    },

    /// A wait did not complete in time.
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout {
        /// What was awaited.
        what: String,
        /// The bound that expired.
        timeout: Duration,
    },

    /// No element matched a selector.
    #[error("no element matches {selector:?}")]
    ElementNotFound {
        /// The selector.
        selector: String,
    },

    /// Client construction failed.
    #[error("failed to build browser client: {0}")]
    Client(String),
}

/// Opens rendered page sessions.
#[async_trait]
pub trait PageBrowser: Send + Sync {
    /// Starts a new session.
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError>;
}

/// One live rendered page.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Loads `url` and waits for the document to be ready.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Waits until an element matching `selector` is visible.
    async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError>;

    /// Runs a script in the page and returns its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Returns the outer HTML of the first match, or of all matches concatenated.
    async fn outer_html(&self, selector: &str, all: bool) -> Result<String, BrowserError>;

    /// Ends the session.
    async fn close(&self) -> Result<(), BrowserError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fake {
    //! Scripted in-process browser for phase tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// What the fake page answers, keyed by selector.
    #[derive(Debug, Default)]
    pub(crate) struct Script {
        /// Successive answers per selector; the last one repeats.
        pub(crate) outer_html: HashMap<String, VecDeque<String>>,
        /// Selectors that never become visible.
        pub(crate) invisible: Vec<String>,
        /// Fail navigation to URLs containing any of these.
        pub(crate) broken_urls: Vec<String>,
        /// Calls seen, in order.
        pub(crate) log: Vec<String>,
        /// Options of every opened session.
        pub(crate) opened: Vec<SessionOptions>,
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeBrowser {
        pub(crate) script: Arc<Mutex<Script>>,
    }

    impl FakeBrowser {
        pub(crate) fn answer(&self, selector: &str, answers: &[&str]) {
            self.script.lock().unwrap().outer_html.insert(
                selector.to_string(),
                answers.iter().map(|a| (*a).to_string()).collect(),
            );
        }

        pub(crate) fn log(&self) -> Vec<String> {
            self.script.lock().unwrap().log.clone()
        }

        pub(crate) fn count(&self, prefix: &str) -> usize {
            self.log().iter().filter(|l| l.starts_with(prefix)).count()
        }
    }

    struct FakeSession {
        script: Arc<Mutex<Script>>,
    }

    #[async_trait]
    impl PageBrowser for FakeBrowser {
        async fn open(
            &self,
            options: &SessionOptions,
        ) -> Result<Box<dyn PageSession>, BrowserError> {
            self.script.lock().unwrap().opened.push(options.clone());
            Ok(Box::new(FakeSession {
                script: Arc::clone(&self.script),
            }))
        }
    }

    #[async_trait]
    impl PageSession for FakeSession {
        async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
            let mut script = self.script.lock().unwrap();
            script.log.push(format!("navigate {url}"));
            if script.broken_urls.iter().any(|b| url.contains(b.as_str())) {
                return Err(BrowserError::Command {
                    command: "navigate".into(),
                    message: "net::ERR_CONNECTION_REFUSED".into(),
                });
            }
            Ok(())
        }

        async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError> {
            let mut script = self.script.lock().unwrap();
            script.log.push(format!("wait {selector}"));
            if script.invisible.iter().any(|s| s == selector) {
                return Err(BrowserError::Timeout {
                    what: selector.to_string(),
                    timeout: DEFAULT_SESSION_TIMEOUT,
                });
            }
            Ok(())
        }

        async fn evaluate(&self, script_text: &str) -> Result<serde_json::Value, BrowserError> {
            self.script
                .lock()
                .unwrap()
                .log
                .push(format!("evaluate {script_text}"));
            Ok(serde_json::Value::Null)
        }

        async fn outer_html(&self, selector: &str, all: bool) -> Result<String, BrowserError> {
            let mut script = self.script.lock().unwrap();
            script.log.push(format!("outer_html {selector} {all}"));
            let Some(answers) = script.outer_html.get_mut(selector) else {
                return Err(BrowserError::ElementNotFound {
                    selector: selector.to_string(),
                });
            };
            let answer = if answers.len() > 1 {
                answers.pop_front()
            } else {
                answers.front().cloned()
            };
            answer.ok_or_else(|| BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })
        }

        async fn close(&self) -> Result<(), BrowserError> {
            self.script.lock().unwrap().log.push("close".to_string());
            Ok(())
        }
    }
}
