//! Log channels for a run.
//!
//! - console: human-readable, stdout
//! - `combined.log`: every event as JSON lines
//! - `error.log`: ERROR events only, as JSON lines
//!
//! The level filter comes from `RUST_LOG` and defaults to `info`. Files are
//! opened in append mode so successive runs accumulate.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const COMBINED_LOG: &str = "combined.log";
pub const ERROR_LOG: &str = "error.log";

pub fn init(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log directory {}", log_dir.display()))?;
    let combined = open_append(&log_dir.join(COMBINED_LOG))?;
    let errors = open_append(&log_dir.join(ERROR_LOG))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Arc::new(combined)),
        )
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Arc::new(errors))
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}
