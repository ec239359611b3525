//! The slice of the Portainer web console the engine depends on.
//!
//! Selectors, label texts and DOM scripts are the implicit contract with the
//! console's UI version. Scripts return small tagged objects so callers only
//! depend on the shape of the answer.

use serde::Deserialize;
use std::time::Duration;

pub const LOGIN_USERNAME: &str = "#username";
pub const LOGIN_PASSWORD: &str = "#password";
pub const LOGIN_SUBMIT: &str = "button[type=\"submit\"]";
/// Rendered once the home page lists environments.
pub const HOME_LANDMARK: &str = "div.blocklist";

pub const ENVIRONMENT_ITEMS: &str = ".blocklist .relative";
pub const ENVIRONMENT_MAPPER: &str = "el => ({ \
    name: el.querySelector('.items-start .items-center span')?.innerText?.trim() || '', \
    dashboard: el.querySelector('a')?.href || '' \
})";

pub const STACK_TABLE: &str = "table";
pub const STACK_LINKS: &str = "table tbody tr td a";
pub const STACK_MAPPER: &str = "a => ({ name: a.innerText.trim(), link: a.href })";

pub const STACK_TABS: &str = "ul.nav-tabs";
pub const UPDATE_CONTROL: &str = "div[authorization=\"PortainerStackUpdate\"] button";
pub const MODAL_CONTENT: &str = ".app-react-components-modals-Modal-Modal-module__modal-content";
pub const ERROR_TOAST: &str = ".toast-error, .Toastify__toast--error";

/// Route segment swapped to go from an environment dashboard to its stacks.
pub const DASHBOARD_SEGMENT: &str = "dashboard";
pub const STACKS_SEGMENT: &str = "stacks";

pub const OPEN_EDITOR_TAB: &str = r#"(() => {
  const tabs = Array.from(document.querySelectorAll('ul.nav-tabs li a'));
  const tab = tabs.find(t => t.textContent.includes('Editor'));
  if (!tab) return { status: 'not_found' };
  tab.click();
  return { status: 'clicked' };
})()"#;

pub const ENABLE_REPULL: &str = r#"(() => {
  const label = Array.from(document.querySelectorAll('label.space-right'))
    .find(l => l.textContent.trim() === 'Re-pull image and redeploy');
  if (!label) return { status: 'label_not_found' };
  const container = label.nextElementSibling;
  if (!container || !container.classList.contains('switch')) return { status: 'switch_not_found' };
  const checkbox = container.querySelector('input[type="checkbox"]');
  if (!checkbox) return { status: 'checkbox_not_found' };
  checkbox.click();
  return { status: 'activated' };
})()"#;

pub const CONFIRM_UPDATE: &str = r#"(() => {
  const modal = document.querySelector('.app-react-components-modals-Modal-Modal-module__modal-content');
  if (!modal) return { status: 'modal_not_found' };
  const button = Array.from(modal.querySelectorAll('button.btn.btn-primary'))
    .find(b => b.textContent.trim() === 'Update');
  if (!button) return { status: 'button_not_found' };
  if (button.disabled) return { status: 'button_disabled' };
  button.click();
  return { status: 'clicked' };
})()"#;

pub const ERROR_TOAST_TEXT: &str = r#"(() => {
  const toast = document.querySelector('.toast-error, .Toastify__toast--error');
  return toast ? toast.textContent : '';
})()"#;

pub const OBSERVE_STATE: &str = r#"(() => {
  if (document.querySelector('div[authorization="PortainerStackUpdate"]')) return { state: 'stack_view' };
  if (document.querySelector('.toast-success, .Toastify__toast--success')) return { state: 'success_toast' };
  if (document.querySelector('.app-react-components-modals-Modal-Modal-module__modal-content')) return { state: 'dialog_open' };
  return { state: 'unrecognised' };
})()"#;

/// No readiness signal exists for the editor tab content.
pub const EDITOR_SETTLE: Duration = Duration::from_millis(2000);
/// Lets the dialog's form finish mounting after the container shows.
pub const MODAL_SETTLE: Duration = Duration::from_millis(1000);
pub const REPULL_SETTLE: Duration = Duration::from_millis(1000);
pub const ERROR_PROBE_TIMEOUT: Duration = Duration::from_millis(3000);
/// Pause after each stack before the next one starts navigating.
pub const STACK_COOLDOWN: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TabClick {
    Clicked,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepullToggle {
    Activated,
    LabelNotFound,
    SwitchNotFound,
    CheckboxNotFound,
}

impl RepullToggle {
    pub fn failure_reason(self) -> Option<&'static str> {
        match self {
            RepullToggle::Activated => None,
            RepullToggle::LabelNotFound => Some("re-pull switch label not found"),
            RepullToggle::SwitchNotFound => Some("switch container not found"),
            RepullToggle::CheckboxNotFound => Some("checkbox not found"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmClick {
    Clicked,
    ModalNotFound,
    ButtonNotFound,
    ButtonDisabled,
}

impl ConfirmClick {
    pub fn failure_reason(self) -> Option<&'static str> {
        match self {
            ConfirmClick::Clicked => None,
            ConfirmClick::ModalNotFound => Some("modal content not found"),
            ConfirmClick::ButtonNotFound => Some("update button not found"),
            ConfirmClick::ButtonDisabled => Some("update button is disabled"),
        }
    }
}

/// Page state checked once after the update is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ObservedState {
    /// Back on the stack view with its update control.
    StackView,
    SuccessToast,
    DialogOpen,
    Unrecognised,
}

/// Stacks listing URL for an environment, derived from its dashboard URL by
/// replacing the first `dashboard` segment.
pub fn stacks_link(dashboard: &str) -> String {
    dashboard.replacen(DASHBOARD_SEGMENT, STACKS_SEGMENT, 1)
}
