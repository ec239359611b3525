//! Automation surface.
//!
//! The engine only talks to these traits. `chrome` provides the concrete
//! implementation over the Chrome DevTools Protocol; tests use an in-memory
//! scripted page instead.

mod cdp;
mod chrome;
mod error;

pub use chrome::ChromeLauncher;
pub use error::BrowserError;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Flags applied when a browser is started.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub default_timeout: Duration,
}

/// Lifecycle point a navigation waits for before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    #[default]
    Load,
    DomContentLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigateOptions {
    /// `None` uses the page default timeout.
    pub timeout: Option<Duration>,
    pub wait_until: WaitUntil,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WaitOptions {
    /// Require a rendered, non-hidden element rather than mere presence.
    pub visible: bool,
    /// `None` uses the page default timeout.
    pub timeout: Option<Duration>,
}

impl WaitOptions {
    pub fn visible() -> Self {
        Self {
            visible: true,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, opts: &LaunchOptions) -> Result<Box<dyn Browser>, BrowserError>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>, BrowserError>;

    /// Release the browser. Safe to call once on every exit path.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// One browsing context. All state (cookies, cache, current document) lives
/// behind this handle and is mutated by every call.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str, opts: NavigateOptions) -> Result<(), BrowserError>;

    /// Resolves once `selector` matches. A timeout is reported as
    /// [`BrowserError::Timeout`].
    async fn wait_for_selector(&self, selector: &str, opts: WaitOptions)
        -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Evaluate a script expression in the live document and return its
    /// JSON-serializable result.
    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    async fn clear_cookies(&self) -> Result<(), BrowserError>;

    async fn set_cache_enabled(&self, enabled: bool) -> Result<(), BrowserError>;

    fn set_default_timeout(&self, timeout: Duration);

    /// Map every element matching `selector` through `mapper`, a script
    /// function taking the element, and collect the results into an array.
    async fn eval_all(&self, selector: &str, mapper: &str) -> Result<Value, BrowserError> {
        let script = format!(
            "Array.from(document.querySelectorAll({})).map({})",
            js_string(selector),
            mapper
        );
        self.evaluate(&script).await
    }
}

/// Quote `s` as a script string literal.
pub(crate) fn js_string(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}
