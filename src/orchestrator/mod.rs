//! Application-level orchestration.
//!
//! This module owns the run lifecycle (browser acquisition, the sequential
//! per-stack loop, guaranteed release) and post-run processing of the report.
//! The CLI layer calls into this module and only deals with arguments and
//! output.

mod controller;
mod post_process;

pub(crate) use controller::run_redeploy;
pub(crate) use post_process::process_run_completion;
