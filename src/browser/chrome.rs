//! Chromium driven over the DevTools Protocol.

use super::cdp::CdpConnection;
use super::{
    js_string, Browser, BrowserError, LaunchOptions, Launcher, NavigateOptions, Page, WaitOptions,
    WaitUntil,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

const EXECUTABLE_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);
const ENDPOINT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Starts a local Chromium/Chrome with a throw-away profile.
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
}

impl ChromeLauncher {
    /// `executable` overrides the `PATH` search.
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    fn resolve_executable(&self) -> Result<PathBuf, BrowserError> {
        if let Some(path) = &self.executable {
            return Ok(path.clone());
        }
        EXECUTABLE_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                BrowserError::Launch(
                    "no Chromium or Chrome executable found on PATH; set CHROME_PATH".into(),
                )
            })
    }
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(&self, opts: &LaunchOptions) -> Result<Box<dyn Browser>, BrowserError> {
        let executable = self.resolve_executable()?;
        let profile = tempfile::tempdir()?;
        let port = free_loopback_port()?;

        let mut cmd = Command::new(&executable);
        cmd.arg(format!("--remote-debugging-port={port}"))
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .args(&opts.args);
        if opts.headless {
            cmd.arg("--headless=new");
        }
        cmd.arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(
            executable = %executable.display(),
            port,
            headless = opts.headless,
            "launching browser"
        );
        let mut child = cmd.spawn().map_err(|e| {
            BrowserError::Launch(format!("failed to start {}: {e}", executable.display()))
        })?;

        let ws_url = wait_for_endpoint(&mut child, port).await?;
        let conn = CdpConnection::connect(&ws_url).await?;

        Ok(Box::new(ChromeBrowser {
            conn: Arc::new(conn),
            child: tokio::sync::Mutex::new(child),
            default_timeout: opts.default_timeout,
            _profile: profile,
        }))
    }
}

fn free_loopback_port() -> Result<u16, BrowserError> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Poll `/json/version` until the browser exposes its WebSocket endpoint.
async fn wait_for_endpoint(child: &mut Child, port: u16) -> Result<String, BrowserError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    let url = format!("http://127.0.0.1:{port}/json/version");
    let deadline = Instant::now() + LAUNCH_TIMEOUT;

    loop {
        if let Some(status) = child.try_wait()? {
            return Err(BrowserError::Launch(format!(
                "browser exited during startup ({status})"
            )));
        }
        if let Ok(resp) = http.get(&url).send().await {
            if let Ok(info) = resp.json::<VersionInfo>().await {
                return Ok(info.web_socket_debugger_url);
            }
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::Launch(format!(
                "DevTools endpoint on port {port} not ready after {}",
                humantime::format_duration(LAUNCH_TIMEOUT)
            )));
        }
        tokio::time::sleep(ENDPOINT_POLL_INTERVAL).await;
    }
}

struct ChromeBrowser {
    conn: Arc<CdpConnection>,
    child: tokio::sync::Mutex<Child>,
    default_timeout: Duration,
    _profile: TempDir,
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>, BrowserError> {
        let target = self
            .conn
            .send("Target.createTarget", json!({ "url": "about:blank" }), None)
            .await?;
        let target_id = target
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Evaluation("createTarget returned no targetId".into()))?;

        let attached = self
            .conn
            .send(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Evaluation("attachToTarget returned no sessionId".into()))?
            .to_owned();

        let page = ChromePage {
            conn: self.conn.clone(),
            session_id,
            default_timeout: Mutex::new(self.default_timeout),
        };
        page.call("Page.enable", json!({})).await?;
        page.call("Network.enable", json!({})).await?;
        Ok(Box::new(page))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        // The browser usually drops the socket before answering.
        let _ = tokio::time::timeout(
            CLOSE_GRACE,
            self.conn.send("Browser.close", json!({}), None),
        )
        .await;

        let mut child = self.child.lock().await;
        match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            _ => {
                tracing::warn!("browser did not exit in time, killing it");
                child.kill().await?;
                Ok(())
            }
        }
    }
}

/// Bound `fut` by `timeout`; expiry is reported as a `Timeout` on `what`.
async fn within<T>(
    timeout: Duration,
    what: String,
    fut: impl Future<Output = Result<T, BrowserError>>,
) -> Result<T, BrowserError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res,
        Err(_) => Err(BrowserError::Timeout { what, timeout }),
    }
}

/// Re-run `check` until it yields `true`. Only a closed connection stops the
/// loop; the caller bounds it with `within`.
async fn poll_until_true<F, Fut>(mut check: F) -> Result<(), BrowserError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, BrowserError>>,
{
    loop {
        match check().await {
            Ok(Value::Bool(true)) => return Ok(()),
            Err(BrowserError::Closed) => return Err(BrowserError::Closed),
            // The document may be mid-navigation; keep polling.
            _ => {}
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

struct ChromePage {
    conn: Arc<CdpConnection>,
    session_id: String,
    default_timeout: Mutex<Duration>,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

impl ChromePage {
    async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.conn.send(method, params, Some(&self.session_id)).await
    }

    fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or_else(|| {
            self.default_timeout
                .lock()
                .map(|d| *d)
                .unwrap_or(Duration::from_secs(30))
        })
    }

    async fn navigate_and_wait(&self, url: &str, wait_until: WaitUntil) -> Result<(), BrowserError> {
        let mut events = self.conn.subscribe();
        let nav = self.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(reason) = nav.get("errorText").and_then(Value::as_str) {
            return Err(BrowserError::Navigation {
                url: url.to_owned(),
                reason: reason.to_owned(),
            });
        }
        // Same-document (hash route) navigations have no loader and fire no load event.
        if nav.get("loaderId").is_none() {
            return Ok(());
        }

        let wanted = match wait_until {
            WaitUntil::Load => "Page.loadEventFired",
            WaitUntil::DomContentLoaded => "Page.domContentEventFired",
        };
        loop {
            match events.recv().await {
                Ok(ev)
                    if ev.method == wanted
                        && ev.session_id.as_deref() == Some(self.session_id.as_str()) =>
                {
                    return Ok(())
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(BrowserError::Closed),
            }
        }
    }

    async fn dispatch_mouse(&self, kind: &str, x: f64, y: f64, button: &str) -> Result<(), BrowserError> {
        self.call(
            "Input.dispatchMouseEvent",
            json!({ "type": kind, "x": x, "y": y, "button": button, "clickCount": 1 }),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn goto(&self, url: &str, opts: NavigateOptions) -> Result<(), BrowserError> {
        let timeout = self.timeout_or_default(opts.timeout);
        within(
            timeout,
            format!("navigation to {url}"),
            self.navigate_and_wait(url, opts.wait_until),
        )
        .await
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        opts: WaitOptions,
    ) -> Result<(), BrowserError> {
        let timeout = self.timeout_or_default(opts.timeout);
        let script = format!(
            "(() => {{ \
                const el = document.querySelector({sel}); \
                if (!el) return false; \
                if (!{visible}) return true; \
                const style = window.getComputedStyle(el); \
                const rect = el.getBoundingClientRect(); \
                return style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0; \
            }})()",
            sel = js_string(selector),
            visible = opts.visible,
        );
        let script = script.as_str();
        within(
            timeout,
            format!("selector `{selector}`"),
            poll_until_true(move || self.evaluate(script)),
        )
        .await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let script = format!(
            "(() => {{ \
                const el = document.querySelector({sel}); \
                if (!el) return null; \
                el.scrollIntoView({{ block: 'center', inline: 'center' }}); \
                const r = el.getBoundingClientRect(); \
                return {{ x: r.left + r.width / 2, y: r.top + r.height / 2 }}; \
            }})()",
            sel = js_string(selector),
        );
        let point: Option<Point> = serde_json::from_value(self.evaluate(&script).await?)
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        let Some(Point { x, y }) = point else {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_owned(),
            });
        };

        self.dispatch_mouse("mouseMoved", x, y, "none").await?;
        self.dispatch_mouse("mousePressed", x, y, "left").await?;
        self.dispatch_mouse("mouseReleased", x, y, "left").await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        // Selecting existing content makes a resubmitted form overwrite it.
        let script = format!(
            "(() => {{ \
                const el = document.querySelector({sel}); \
                if (!el) return false; \
                el.focus(); \
                if (typeof el.select === 'function') el.select(); \
                return true; \
            }})()",
            sel = js_string(selector),
        );
        if self.evaluate(&script).await? != Value::Bool(true) {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_owned(),
            });
        }

        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let key: &str = ch.encode_utf8(&mut buf);
            self.call(
                "Input.dispatchKeyEvent",
                json!({ "type": "keyDown", "text": key, "key": key }),
            )
            .await?;
            self.call("Input.dispatchKeyEvent", json!({ "type": "keyUp", "key": key }))
                .await?;
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let resp = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": script,
                    "returnByValue": true,
                    "awaitPromise": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if let Some(details) = resp.get("exceptionDetails") {
            let message = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("uncaught exception");
            return Err(BrowserError::Evaluation(message.to_owned()));
        }
        Ok(resp.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    async fn clear_cookies(&self) -> Result<(), BrowserError> {
        self.call("Network.clearBrowserCookies", json!({}))
            .await
            .map(|_| ())
    }

    async fn set_cache_enabled(&self, enabled: bool) -> Result<(), BrowserError> {
        self.call(
            "Network.setCacheDisabled",
            json!({ "cacheDisabled": !enabled }),
        )
        .await
        .map(|_| ())
    }

    fn set_default_timeout(&self, timeout: Duration) {
        if let Ok(mut current) = self.default_timeout.lock() {
            *current = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_executable_skips_path_search() {
        let launcher = ChromeLauncher::new(Some(PathBuf::from("/opt/chromium/chrome")));
        assert_eq!(
            launcher.resolve_executable().unwrap(),
            PathBuf::from("/opt/chromium/chrome")
        );
    }

    #[test]
    fn version_info_reads_debugger_url() {
        let info: VersionInfo = serde_json::from_str(
            r#"{"Browser":"Chrome/129.0","webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/browser/abc"}"#,
        )
        .unwrap();
        assert_eq!(
            info.web_socket_debugger_url,
            "ws://127.0.0.1:9222/devtools/browser/abc"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_operation_fails_at_its_deadline() {
        let start = Instant::now();
        let err = within(
            Duration::from_secs(3),
            "selector `#username`".into(),
            std::future::pending::<Result<(), BrowserError>>(),
        )
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn selector_wait_gives_up_when_evaluation_never_answers() {
        let start = Instant::now();
        let err = within(
            Duration::from_secs(5),
            "selector `div.blocklist`".into(),
            poll_until_true(|| std::future::pending::<Result<Value, BrowserError>>()),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            BrowserError::Timeout { ref what, .. } if what == "selector `div.blocklist`"
        ));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_skips_failures_until_true() {
        let mut checks = 0;
        poll_until_true(|| {
            checks += 1;
            let answer = match checks {
                1 => Err(BrowserError::Evaluation("document navigating".into())),
                2 => Ok(Value::Bool(false)),
                _ => Ok(Value::Bool(true)),
            };
            async move { answer }
        })
        .await
        .unwrap();

        assert_eq!(checks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_stops_on_closed_connection() {
        let err = poll_until_true(|| async { Err(BrowserError::Closed) })
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Closed));
    }

    #[test]
    fn free_port_is_nonzero() {
        assert_ne!(free_loopback_port().unwrap(), 0);
    }
}
