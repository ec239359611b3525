//! Scripted in-memory automation surface for tests.
//!
//! `FakePage` answers script evaluations from registered responses (matched
//! by substring, latest registration wins), treats every selector as present
//! unless hidden, and records every interaction in order.

use crate::browser::{
    Browser, BrowserError, LaunchOptions, Launcher, NavigateOptions, Page, WaitOptions,
};
use crate::engine::console;
use crate::model::{RetryPolicy, RunConfig, Secret};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const BASE_URL: &str = "http://portainer.test";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Goto(String),
    Wait(String),
    Click(String),
    Type(String, String),
    Eval(String),
    ClearCookies,
    SetCacheEnabled(bool),
    SetDefaultTimeout(Duration),
}

#[derive(Default)]
struct FakeState {
    current_url: String,
    calls: Vec<Call>,
    navigations: Vec<(String, NavigateOptions)>,
    wait_timeouts: Vec<(String, Option<Duration>)>,
    responses: Vec<(String, Value)>,
    hidden: HashSet<String>,
    failing_waits: HashMap<(String, String), u32>,
    launched: bool,
    closed: bool,
}

#[derive(Clone, Default)]
pub(crate) struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

pub(crate) fn stack_link(name: &str) -> String {
    format!("{BASE_URL}/#!/3/docker/stacks/{name}?type=2&regular=true")
}

/// A valid configuration for the fake console.
pub(crate) fn config(stacks: &[&str]) -> RunConfig {
    RunConfig {
        base_url: BASE_URL.into(),
        username: "admin".into(),
        password: Secret::new("s3cret"),
        environment: "local".into(),
        stacks: stacks.iter().map(|s| s.to_string()).collect(),
        headless: true,
        timeout: Duration::from_secs(30),
        retry: RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        },
    }
}

impl FakePage {
    /// A console with environments `local` and `edge`, where `local` lists
    /// `stacks`, and every workflow step succeeds.
    pub fn portainer(stacks: &[&str]) -> Self {
        let page = Self::default();
        page.respond(
            console::ENVIRONMENT_MAPPER,
            json!([
                { "name": "edge", "dashboard": format!("{BASE_URL}/#!/7/docker/dashboard") },
                { "name": "local", "dashboard": format!("{BASE_URL}/#!/3/docker/dashboard") },
            ]),
        );
        let listed: Vec<Value> = stacks
            .iter()
            .map(|name| json!({ "name": name, "link": stack_link(name) }))
            .collect();
        page.respond(console::STACK_MAPPER, Value::Array(listed));
        page.respond(console::OPEN_EDITOR_TAB, json!({ "status": "clicked" }));
        page.respond(console::ENABLE_REPULL, json!({ "status": "activated" }));
        page.respond(console::CONFIRM_UPDATE, json!({ "status": "clicked" }));
        page.respond(console::OBSERVE_STATE, json!({ "state": "stack_view" }));
        page.respond(console::ERROR_TOAST_TEXT, json!(""));
        page.hide(console::ERROR_TOAST);
        page
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().expect("fake page state poisoned");
        f(&mut state)
    }

    pub fn respond(&self, key: &str, value: Value) {
        self.with_state(|s| s.responses.push((key.to_owned(), value)));
    }

    pub fn hide(&self, selector: &str) {
        self.with_state(|s| s.hidden.insert(selector.to_owned()));
    }

    pub fn show(&self, selector: &str) {
        self.with_state(|s| s.hidden.remove(selector));
    }

    /// Time out the next `times` waits for `selector` while on `url`.
    pub fn fail_wait(&self, url: &str, selector: &str, times: u32) {
        self.with_state(|s| {
            s.failing_waits
                .insert((url.to_owned(), selector.to_owned()), times)
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn gotos(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Goto(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// Options passed to every navigation to `url`, in order.
    pub fn navigate_options(&self, url: &str) -> Vec<NavigateOptions> {
        self.with_state(|s| {
            s.navigations
                .iter()
                .filter(|(u, _)| u == url)
                .map(|(_, opts)| *opts)
                .collect()
        })
    }

    /// Timeouts passed to every wait for `selector`, in order.
    pub fn wait_timeouts(&self, selector: &str) -> Vec<Option<Duration>> {
        self.with_state(|s| {
            s.wait_timeouts
                .iter()
                .filter(|(sel, _)| sel == selector)
                .map(|(_, timeout)| *timeout)
                .collect()
        })
    }

    pub fn eval_count(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Eval(k) if k == key))
            .count()
    }

    pub fn was_launched(&self) -> bool {
        self.with_state(|s| s.launched)
    }

    pub fn browser_closed(&self) -> bool {
        self.with_state(|s| s.closed)
    }

    fn record(&self, call: Call) {
        self.with_state(|s| s.calls.push(call));
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str, opts: NavigateOptions) -> Result<(), BrowserError> {
        self.with_state(|s| {
            s.calls.push(Call::Goto(url.to_owned()));
            s.navigations.push((url.to_owned(), opts));
            s.current_url = url.to_owned();
        });
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        opts: WaitOptions,
    ) -> Result<(), BrowserError> {
        let present = self.with_state(|s| {
            s.calls.push(Call::Wait(selector.to_owned()));
            s.wait_timeouts.push((selector.to_owned(), opts.timeout));
            let key = (s.current_url.clone(), selector.to_owned());
            if let Some(remaining) = s.failing_waits.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return false;
                }
            }
            !s.hidden.contains(selector)
        });
        if present {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: format!("selector `{selector}`"),
                timeout: opts.timeout.unwrap_or(Duration::from_secs(30)),
            })
        }
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let hidden = self.with_state(|s| {
            s.calls.push(Call::Click(selector.to_owned()));
            s.hidden.contains(selector)
        });
        if hidden {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_owned(),
            });
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.record(Call::Type(selector.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        self.with_state(|s| {
            let hit = s
                .responses
                .iter()
                .rev()
                .find(|(key, _)| script.contains(key.as_str()))
                .cloned();
            match hit {
                Some((key, value)) => {
                    s.calls.push(Call::Eval(key));
                    Ok(value)
                }
                None => {
                    s.calls.push(Call::Eval(script.to_owned()));
                    Err(BrowserError::Evaluation("no scripted response".into()))
                }
            }
        })
    }

    async fn clear_cookies(&self) -> Result<(), BrowserError> {
        self.record(Call::ClearCookies);
        Ok(())
    }

    async fn set_cache_enabled(&self, enabled: bool) -> Result<(), BrowserError> {
        self.record(Call::SetCacheEnabled(enabled));
        Ok(())
    }

    fn set_default_timeout(&self, timeout: Duration) {
        self.record(Call::SetDefaultTimeout(timeout));
    }
}

pub(crate) struct FakeBrowser {
    page: FakePage,
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>, BrowserError> {
        Ok(Box::new(self.page.clone()))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page.with_state(|s| s.closed = true);
        Ok(())
    }
}

/// Hands out a `FakeBrowser` over a shared `FakePage`.
pub(crate) struct FakeLauncher {
    pub page: FakePage,
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, _opts: &LaunchOptions) -> Result<Box<dyn Browser>, BrowserError> {
        self.page.with_state(|s| s.launched = true);
        Ok(Box::new(FakeBrowser {
            page: self.page.clone(),
        }))
    }
}
