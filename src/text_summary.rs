//! Text summary builder for CLI output.

use crate::model::RunReport;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a completed run.
pub(crate) fn build_text_summary(report: &RunReport) -> TextSummary {
    let mut lines = Vec::with_capacity(report.stacks.len() + 2);
    lines.push(format!("Console:     {}", report.base_url));
    lines.push(format!("Environment: {}", report.environment));

    let width = report
        .stacks
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0);
    for (i, stack) in report.stacks.iter().enumerate() {
        lines.push(format!(
            "{:>2}. {:<width$}  {}",
            i + 1,
            stack.name,
            stack.outcome
        ));
    }
    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StackReport, UpdateOutcome};

    #[test]
    fn lines_list_stacks_in_run_order() {
        let report = RunReport {
            timestamp_utc: "2026-10-16T08:00:00Z".into(),
            base_url: "http://portainer.test".into(),
            environment: "local".into(),
            stacks: vec![
                StackReport {
                    name: "web".into(),
                    outcome: UpdateOutcome::Success,
                },
                StackReport {
                    name: "worker".into(),
                    outcome: UpdateOutcome::InProgress,
                },
            ],
        };

        let summary = build_text_summary(&report);

        assert_eq!(
            summary.lines,
            vec![
                "Console:     http://portainer.test",
                "Environment: local",
                " 1. web     success",
                " 2. worker  in-progress",
            ]
        );
    }

    #[test]
    fn non_ascii_names_stay_aligned() {
        let report = RunReport {
            timestamp_utc: "2026-10-16T08:00:00Z".into(),
            base_url: "http://portainer.test".into(),
            environment: "local".into(),
            stacks: vec![
                StackReport {
                    name: "café".into(),
                    outcome: UpdateOutcome::Success,
                },
                StackReport {
                    name: "web".into(),
                    outcome: UpdateOutcome::Unknown,
                },
            ],
        };

        let summary = build_text_summary(&report);

        assert_eq!(summary.lines[2], " 1. café  success");
        assert_eq!(summary.lines[3], " 2. web   unknown");
    }
}
