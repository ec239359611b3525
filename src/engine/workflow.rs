//! Per-stack update workflow.
//!
//! One attempt walks the steps below strictly in order. Any failure aborts
//! the attempt and the retry unit restarts it from `Navigate`.
//!
//! ```text
//! Navigate -> OpenEditor -> TriggerUpdate -> AwaitModal
//!          -> EnableRepull -> Confirm -> ObserveOutcome
//! ```

use super::console::{
    self, ConfirmClick, ObservedState, RepullToggle, TabClick, ERROR_TOAST, MODAL_CONTENT,
    STACK_TABS, UPDATE_CONTROL,
};
use super::{eval_as, settle};
use crate::browser::{NavigateOptions, Page, WaitOptions, WaitUntil};
use crate::error::RedeployError;
use crate::model::{RunConfig, Stack, UpdateOutcome};
use crate::retry::with_retry;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Navigate,
    OpenEditor,
    TriggerUpdate,
    AwaitModal,
    EnableRepull,
    Confirm,
    ObserveOutcome,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Navigate => "navigate to stack",
            Step::OpenEditor => "open editor tab",
            Step::TriggerUpdate => "trigger update dialog",
            Step::AwaitModal => "wait for update dialog",
            Step::EnableRepull => "enable re-pull",
            Step::Confirm => "confirm update",
            Step::ObserveOutcome => "observe outcome",
        })
    }
}

/// Update one stack, retrying the whole workflow as a unit, then hold the
/// cooldown before handing control back.
pub(crate) async fn update_stack(
    page: &dyn Page,
    stack: &Stack,
    cfg: &RunConfig,
) -> Result<UpdateOutcome, RedeployError> {
    tracing::info!("Starting update for stack: {}", stack.name);
    let label = format!("update stack {}", stack.name);
    let outcome = with_retry(&label, &cfg.retry, || run_attempt(page, stack, cfg.timeout)).await?;

    match outcome {
        UpdateOutcome::Success => tracing::info!("Successfully updated stack: {}", stack.name),
        UpdateOutcome::InProgress => tracing::info!(
            "Stack {} update still in progress, but no errors detected",
            stack.name
        ),
        UpdateOutcome::Unknown => tracing::warn!(
            "Stack {} update status unknown, but no errors detected",
            stack.name
        ),
    }

    tokio::time::sleep(console::STACK_COOLDOWN).await;
    Ok(outcome)
}

/// One pass through the steps.
async fn run_attempt(
    page: &dyn Page,
    stack: &Stack,
    timeout: Duration,
) -> Result<UpdateOutcome, RedeployError> {
    let mut step = Step::Navigate;
    loop {
        tracing::debug!(stack = %stack.name, %step, "workflow step");
        step = match step {
            Step::Navigate => {
                navigate(page, stack, timeout).await?;
                Step::OpenEditor
            }
            Step::OpenEditor => {
                open_editor(page).await?;
                Step::TriggerUpdate
            }
            Step::TriggerUpdate => {
                trigger_update(page, timeout).await?;
                Step::AwaitModal
            }
            Step::AwaitModal => {
                await_modal(page, timeout).await?;
                Step::EnableRepull
            }
            Step::EnableRepull => {
                enable_repull(page).await?;
                Step::Confirm
            }
            Step::Confirm => {
                confirm(page).await?;
                Step::ObserveOutcome
            }
            Step::ObserveOutcome => return observe_outcome(page).await,
        };
    }
}

async fn navigate(page: &dyn Page, stack: &Stack, timeout: Duration) -> Result<(), RedeployError> {
    tracing::info!("Navigating to stack page: {}", stack.link);
    let opts = NavigateOptions {
        timeout: Some(timeout * 2),
        wait_until: WaitUntil::DomContentLoaded,
    };
    page.goto(&stack.link, opts)
        .await
        .map_err(RedeployError::ui(Step::Navigate.to_string()))?;
    page.wait_for_selector(STACK_TABS, WaitOptions::visible().with_timeout(timeout))
        .await
        .map_err(RedeployError::ui(Step::Navigate.to_string()))
}

async fn open_editor(page: &dyn Page) -> Result<(), RedeployError> {
    tracing::info!("Clicking Editor tab");
    let context = Step::OpenEditor.to_string();
    match eval_as::<TabClick>(page, &context, console::OPEN_EDITOR_TAB).await? {
        TabClick::Clicked => {}
        TabClick::NotFound => return Err(RedeployError::EditorTabNotFound),
    }
    settle("editor tab", console::EDITOR_SETTLE).await;
    Ok(())
}

async fn trigger_update(page: &dyn Page, timeout: Duration) -> Result<(), RedeployError> {
    tracing::info!("Looking for initial update button");
    let context = Step::TriggerUpdate.to_string();
    page.wait_for_selector(UPDATE_CONTROL, WaitOptions::visible().with_timeout(timeout))
        .await
        .map_err(RedeployError::ui(context.clone()))?;
    tracing::info!("Clicking initial update button");
    page.click(UPDATE_CONTROL)
        .await
        .map_err(RedeployError::ui(context))
}

async fn await_modal(page: &dyn Page, timeout: Duration) -> Result<(), RedeployError> {
    tracing::info!("Waiting for modal");
    page.wait_for_selector(MODAL_CONTENT, WaitOptions::visible().with_timeout(timeout))
        .await
        .map_err(RedeployError::ui(Step::AwaitModal.to_string()))?;
    settle("update dialog", console::MODAL_SETTLE).await;
    Ok(())
}

/// There is no fallback here: updating without the re-pull would redeploy
/// the cached images.
async fn enable_repull(page: &dyn Page) -> Result<(), RedeployError> {
    tracing::info!("Activating repull option");
    let context = Step::EnableRepull.to_string();
    let toggle: RepullToggle = eval_as(page, &context, console::ENABLE_REPULL).await?;
    if let Some(reason) = toggle.failure_reason() {
        return Err(RedeployError::RepullNotActivated { reason });
    }
    tracing::info!("Repull option activated successfully");
    settle("re-pull switch", console::REPULL_SETTLE).await;
    Ok(())
}

/// The script checks `disabled` before clicking; a disabled button is never
/// activated.
async fn confirm(page: &dyn Page) -> Result<(), RedeployError> {
    tracing::info!("Looking for update button in modal");
    let context = Step::Confirm.to_string();
    let click: ConfirmClick = eval_as(page, &context, console::CONFIRM_UPDATE).await?;
    if let Some(reason) = click.failure_reason() {
        tracing::error!("Error during update confirmation: {reason}");
        return Err(RedeployError::ConfirmRejected { reason });
    }
    tracing::info!("Update button clicked successfully");
    Ok(())
}

/// Give an error notification a short window to appear; without one, check
/// the page state once.
async fn observe_outcome(page: &dyn Page) -> Result<UpdateOutcome, RedeployError> {
    tracing::info!("Waiting for update completion");
    let context = Step::ObserveOutcome.to_string();

    let probe = WaitOptions {
        visible: false,
        timeout: Some(console::ERROR_PROBE_TIMEOUT),
    };
    match page.wait_for_selector(ERROR_TOAST, probe).await {
        Ok(()) => {
            let text: String = eval_as(page, &context, console::ERROR_TOAST_TEXT).await?;
            return Err(RedeployError::RemoteReported(text.trim().to_owned()));
        }
        Err(e) if e.is_timeout() => {}
        Err(e) => return Err(RedeployError::ui(context)(e)),
    }

    let state: ObservedState = eval_as(page, &context, console::OBSERVE_STATE).await?;
    Ok(match state {
        ObservedState::StackView | ObservedState::SuccessToast => UpdateOutcome::Success,
        ObservedState::DialogOpen => UpdateOutcome::InProgress,
        ObservedState::Unrecognised => UpdateOutcome::Unknown,
    })
}
