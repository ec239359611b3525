//! Post-run processing.
//!
//! Turns a completed run report into what presentation layers emit.

use crate::model::RunReport;
use crate::text_summary::build_text_summary;
use anyhow::{Context, Result};

/// Result of post-run processing, ready for output.
pub(crate) struct ProcessedRun {
    /// Human-readable lines for the log.
    pub summary: Vec<String>,
    /// Pretty JSON for stdout when requested.
    pub json: Option<String>,
}

pub(crate) fn process_run_completion(report: &RunReport, json: bool) -> Result<ProcessedRun> {
    let summary = build_text_summary(report).lines;
    let json = if json {
        Some(serde_json::to_string_pretty(report).context("serialize run report")?)
    } else {
        None
    };
    Ok(ProcessedRun { summary, json })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StackReport, UpdateOutcome};

    fn report() -> RunReport {
        RunReport {
            timestamp_utc: "2026-10-16T08:00:00Z".into(),
            base_url: "http://portainer.test".into(),
            environment: "local".into(),
            stacks: vec![StackReport {
                name: "web".into(),
                outcome: UpdateOutcome::Unknown,
            }],
        }
    }

    #[test]
    fn json_only_when_requested() {
        assert!(process_run_completion(&report(), false).unwrap().json.is_none());

        let processed = process_run_completion(&report(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&processed.json.unwrap()).unwrap();
        assert_eq!(value["stacks"][0]["outcome"], "unknown");
        assert_eq!(value["environment"], "local");
        assert_eq!(processed.summary.len(), 3);
    }
}
