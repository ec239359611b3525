//! Error kinds for a redeploy run.
//!
//! Configuration and discovery errors are fatal and raised outside any retry
//! unit. Everything else is raised from inside a retry unit and only becomes
//! fatal once the unit runs out of attempts.

use crate::browser::BrowserError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedeployError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingConfig(Vec<&'static str>),

    #[error("At least one stack name must be provided in PORTAINER_STACKS")]
    NoStacks,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Environment {0} not found")]
    EnvironmentNotFound(String),

    #[error("Stacks not found: {}", .0.join(", "))]
    StacksNotFound(Vec<String>),

    #[error("{context}: {source}")]
    Ui {
        context: String,
        #[source]
        source: BrowserError,
    },

    #[error("Editor tab not found")]
    EditorTabNotFound,

    #[error("Failed to activate repull option ({reason})")]
    RepullNotActivated { reason: &'static str },

    #[error("Failed to click update button in modal ({reason})")]
    ConfirmRejected { reason: &'static str },

    #[error("Update failed - Error: {0}")]
    RemoteReported(String),

    #[error("unexpected result from {context}: {detail}")]
    UnexpectedResult { context: String, detail: String },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl RedeployError {
    /// Wrap an automation-surface failure with the interaction that caused it.
    pub fn ui(context: impl Into<String>) -> impl FnOnce(BrowserError) -> RedeployError {
        let context = context.into();
        move |source| RedeployError::Ui { context, source }
    }
}
