use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Immutable run configuration, built and validated once from CLI/env.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    pub username: String,
    pub password: Secret,
    pub environment: String,
    /// Requested stacks in processing order. Duplicates are kept.
    pub stacks: Vec<String>,
    pub headless: bool,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// An environment listed on the console home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub dashboard_link: String,
    pub stacks_link: String,
}

/// A stack listed in an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    pub link: String,
}

/// What was observed after confirming an update. None of these is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateOutcome {
    Success,
    /// The dialog is still open with no error shown.
    InProgress,
    /// Neither a success nor an error signal was recognised.
    Unknown,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateOutcome::Success => "success",
            UpdateOutcome::InProgress => "in-progress",
            UpdateOutcome::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackReport {
    pub name: String,
    pub outcome: UpdateOutcome,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp_utc: String,
    pub base_url: String,
    pub environment: String,
    pub stacks: Vec<StackReport>,
}
