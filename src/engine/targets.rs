//! Stack discovery and validation of the requested names.

use super::console::{STACK_LINKS, STACK_MAPPER, STACK_TABLE};
use super::decode;
use crate::browser::{NavigateOptions, Page, WaitOptions};
use crate::error::RedeployError;
use crate::model::{Environment, RunConfig, Stack};
use crate::retry::with_retry;

/// Open the environment's stack list and read every name/link pair.
pub(crate) async fn discover_stacks(
    page: &dyn Page,
    env: &Environment,
    cfg: &RunConfig,
) -> Result<Vec<Stack>, RedeployError> {
    tracing::info!("Opening stack list: {}", env.stacks_link);
    page.goto(&env.stacks_link, NavigateOptions::default())
        .await
        .map_err(RedeployError::ui("open stack list"))?;
    page.wait_for_selector(STACK_TABLE, WaitOptions::visible())
        .await
        .map_err(RedeployError::ui("open stack list"))?;

    let stacks = with_retry("fetch stacks", &cfg.retry, || list_stacks(page)).await?;
    tracing::info!("Found {} stack(s) in {}", stacks.len(), env.name);
    Ok(stacks)
}

async fn list_stacks(page: &dyn Page) -> Result<Vec<Stack>, RedeployError> {
    let value = page
        .eval_all(STACK_LINKS, STACK_MAPPER)
        .await
        .map_err(RedeployError::ui("fetch stacks"))?;
    decode("fetch stacks", value)
}

/// Map each requested name to its discovered stack, keeping request order and
/// duplicates. Any unknown name fails the whole set, and all unknown names are
/// reported together.
pub(crate) fn resolve_targets(
    requested: &[String],
    discovered: &[Stack],
) -> Result<Vec<Stack>, RedeployError> {
    let mut targets = Vec::with_capacity(requested.len());
    let mut missing = Vec::new();
    for name in requested {
        match discovered.iter().find(|s| &s.name == name) {
            Some(stack) => targets.push(stack.clone()),
            None => missing.push(name.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(RedeployError::StacksNotFound(missing));
    }
    Ok(targets)
}
