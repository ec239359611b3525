//! Console automation: login and environment lookup, stack discovery, and
//! the per-stack update workflow. Every function takes the page handle as an
//! argument; nothing here keeps it.

pub(crate) mod console;
mod session;
mod targets;
mod workflow;

pub(crate) use session::bootstrap;
pub(crate) use targets::{discover_stacks, resolve_targets};
pub(crate) use workflow::update_stack;

use crate::browser::Page;
use crate::error::RedeployError;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Evaluate `script` and decode its result as `T`.
async fn eval_as<T: DeserializeOwned>(
    page: &dyn Page,
    context: &str,
    script: &str,
) -> Result<T, RedeployError> {
    let value = page
        .evaluate(script)
        .await
        .map_err(RedeployError::ui(context))?;
    decode(context, value)
}

fn decode<T: DeserializeOwned>(context: &str, value: serde_json::Value) -> Result<T, RedeployError> {
    serde_json::from_value(value).map_err(|e| RedeployError::UnexpectedResult {
        context: context.to_owned(),
        detail: e.to_string(),
    })
}

/// Fixed wait standing in for a readiness signal the console does not expose.
async fn settle(what: &str, delay: Duration) {
    tracing::debug!("settling {what} for {}", humantime::format_duration(delay));
    tokio::time::sleep(delay).await;
}
