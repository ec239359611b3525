use std::time::Duration;
use thiserror::Error;

/// Failures reported by the automation surface.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("timed out after {} waiting for {what}", humantime::format_duration(*timeout))]
    Timeout { what: String, timeout: Duration },

    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("DevTools protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("DevTools connection closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl BrowserError {
    /// A wait that ran out of time; callers treat this as "not present".
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}
