use crate::browser::ChromeLauncher;
use crate::error::RedeployError;
use crate::model::{RetryPolicy, RunConfig, Secret};
use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "portainer-redeploy",
    version,
    about = "Force a re-pull and redeploy of Portainer stacks through the web console"
)]
pub struct Cli {
    /// Base URL of the Portainer console
    #[arg(long, env = "PORTAINER_URL", default_value = "http://localhost:9000")]
    pub url: String,

    /// Console username
    #[arg(long, env = "PORTAINER_USERNAME")]
    pub username: Option<String>,

    /// Console password
    #[arg(long, env = "PORTAINER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Comma-separated stack names, updated in the given order
    #[arg(long, env = "PORTAINER_STACKS", value_delimiter = ',')]
    pub stacks: Vec<String>,

    /// Name of the environment the stacks live in
    #[arg(long, env = "PORTAINER_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Application environment; `prod` runs the browser headless
    #[arg(long, env = "APP_ENV", default_value = "dev")]
    pub app_env: String,

    /// Timeout for each wait and navigation, in milliseconds
    #[arg(long, env = "OPERATION_TIMEOUT", default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Attempts per retryable operation
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Delay between attempts, in milliseconds
    #[arg(long, env = "RETRY_DELAY", default_value_t = 5_000)]
    pub retry_delay_ms: u64,

    /// Browser executable (defaults to the first Chromium/Chrome on PATH)
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Directory for combined.log and error.log
    #[arg(long, env = "LOG_DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Print the run report as JSON on success
    #[arg(long)]
    pub json: bool,
}

/// Validate arguments into an immutable `RunConfig`.
///
/// Every missing required value is reported at once.
pub fn build_config(args: &Cli) -> Result<RunConfig, RedeployError> {
    let username = non_empty(args.username.as_deref());
    let password = non_empty(args.password.as_deref());
    let environment = non_empty(args.environment.as_deref());
    let stacks: Vec<String> = args
        .stacks
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    let mut missing = Vec::new();
    if username.is_none() {
        missing.push("PORTAINER_USERNAME");
    }
    if password.is_none() {
        missing.push("PORTAINER_PASSWORD");
    }
    if args.stacks.is_empty() {
        missing.push("PORTAINER_STACKS");
    }
    if environment.is_none() {
        missing.push("PORTAINER_ENVIRONMENT");
    }
    if !missing.is_empty() {
        return Err(RedeployError::MissingConfig(missing));
    }
    if stacks.is_empty() {
        return Err(RedeployError::NoStacks);
    }
    if args.retry_attempts == 0 {
        return Err(RedeployError::InvalidConfig(
            "RETRY_ATTEMPTS must be at least 1".into(),
        ));
    }
    if args.timeout_ms == 0 {
        return Err(RedeployError::InvalidConfig(
            "OPERATION_TIMEOUT must be greater than 0".into(),
        ));
    }

    Ok(RunConfig {
        base_url: args.url.clone(),
        username: username.unwrap_or_default().to_owned(),
        password: Secret::new(password.unwrap_or_default()),
        environment: environment.unwrap_or_default().to_owned(),
        stacks,
        headless: args.app_env == "prod",
        timeout: Duration::from_millis(args.timeout_ms),
        retry: RetryPolicy {
            max_attempts: args.retry_attempts,
            delay: Duration::from_millis(args.retry_delay_ms),
        },
    })
}

/// `--help` and `--version` end the process normally; every other parse
/// error is a configuration failure.
pub fn is_informational(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    )
}

/// Log directory to use when the arguments themselves could not be parsed.
pub fn fallback_log_dir() -> PathBuf {
    std::env::var_os("LOG_DIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn run(args: Cli) -> Result<()> {
    // Configuration errors surface before the browser is started.
    let cfg = build_config(&args)?;
    tracing::debug!(?cfg, "configuration loaded");

    let launcher = ChromeLauncher::new(args.chrome_path.clone());
    let report = crate::orchestrator::run_redeploy(&cfg, &launcher)
        .await
        .context("stack update run failed")?;

    let processed = crate::orchestrator::process_run_completion(&report, args.json)?;
    for line in &processed.summary {
        tracing::info!("{line}");
    }
    if let Some(json) = processed.json {
        println!("{json}");
    }
    Ok(())
}
