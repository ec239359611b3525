//! Run lifecycle controller.
//!
//! Owns the browser for the duration of a run: acquire, configure, drive the
//! engine stack by stack, and release on every exit path.

use crate::browser::{Browser, LaunchOptions, Launcher};
use crate::engine;
use crate::error::RedeployError;
use crate::model::{RunConfig, RunReport, StackReport};

/// Sandboxing flags the browser is always started with.
const BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
];

fn launch_options(cfg: &RunConfig) -> LaunchOptions {
    LaunchOptions {
        headless: cfg.headless,
        args: BROWSER_ARGS.iter().map(|a| a.to_string()).collect(),
        default_timeout: cfg.timeout,
    }
}

/// Run the full redeploy: login, discovery, then each requested stack in
/// order. Stops at the first unrecovered failure.
pub(crate) async fn run_redeploy(
    cfg: &RunConfig,
    launcher: &dyn Launcher,
) -> Result<RunReport, RedeployError> {
    tracing::info!("Starting Portainer stack update process");
    let browser = launcher.launch(&launch_options(cfg)).await?;

    let result = drive(cfg, browser.as_ref()).await;

    if let Err(e) = browser.close().await {
        tracing::warn!("Failed to close browser cleanly: {e}");
    }
    result
}

async fn drive(cfg: &RunConfig, browser: &dyn Browser) -> Result<RunReport, RedeployError> {
    let page = browser.new_page().await?;
    let page = page.as_ref();

    // Start from a clean slate so nothing leaks between runs.
    page.set_default_timeout(cfg.timeout);
    page.clear_cookies().await?;
    page.set_cache_enabled(false).await?;

    let env = engine::bootstrap(page, cfg).await?;
    let discovered = engine::discover_stacks(page, &env, cfg).await?;
    // Validate every requested name before touching any stack.
    let targets = engine::resolve_targets(&cfg.stacks, &discovered)?;

    let mut stacks = Vec::with_capacity(targets.len());
    for stack in &targets {
        let outcome = engine::update_stack(page, stack, cfg).await?;
        stacks.push(StackReport {
            name: stack.name.clone(),
            outcome,
        });
    }

    tracing::info!("All stacks updated successfully");
    Ok(RunReport {
        timestamp_utc: now_rfc3339(),
        base_url: cfg.base_url.clone(),
        environment: env.name,
        stacks,
    })
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}
