//! Run report: the user-visible summary of a pipeline run.

use crate::error::Result;
use crate::runner::pipeline::PipelineStatus;
use crate::steps::ExecutionResult;
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::time::Duration;

/// Terminal state of one step, as reported.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Step id.
    pub id: String,

    /// Execution unit the step ran.
    pub unit: String,

    /// Terminal execution result.
    #[serde(flatten)]
    pub execution: ExecutionResult,

    /// Wall-clock duration in milliseconds (zero for skipped steps).
    pub duration_ms: u64,

    /// Failure or skip detail, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Summary of a whole pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Pipeline name, when the file declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Final pipeline state.
    pub status: PipelineStatus,

    /// Content digest of the pipeline file.
    pub fingerprint: String,

    /// Machine profile the pipeline requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,

    /// When the run entered Running.
    pub started_at: DateTime<Utc>,

    /// When the run reached its terminal state.
    pub finished_at: DateTime<Utc>,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Per-step outcomes in declaration order.
    pub steps: Vec<StepOutcome>,
}

impl RunReport {
    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Succeeded
    }

    /// Ids of steps that ended in Failure, with their exit codes.
    pub fn failed_steps(&self) -> Vec<(&str, Option<i32>)> {
        self.steps
            .iter()
            .filter_map(|s| match s.execution {
                ExecutionResult::Failure { exit_code } => Some((s.id.as_str(), exit_code)),
                _ => None,
            })
            .collect()
    }

    /// Render the report as JSON.
    pub fn render_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::error::GantryError::Other(e.into()))
    }

    /// Render the report for a terminal.
    pub fn render_human(&self) -> String {
        let mut out = String::new();

        let headline = match self.status {
            PipelineStatus::Succeeded => style(format!(
                "Pipeline succeeded in {}",
                format_duration(Duration::from_millis(self.duration_ms))
            ))
            .green()
            .bold(),
            PipelineStatus::TimedOut => style(format!(
                "Pipeline timed out after {}",
                format_duration(Duration::from_millis(self.duration_ms))
            ))
            .red()
            .bold(),
            _ => style(format!(
                "Pipeline {} in {}",
                self.status,
                format_duration(Duration::from_millis(self.duration_ms))
            ))
            .red()
            .bold(),
        };
        out.push_str(&headline.to_string());
        out.push('\n');

        for step in &self.steps {
            out.push_str(&format!("  {}\n", summary_line(step)));
        }

        let mut footer = format!("fingerprint {}", self.fingerprint);
        if let Some(machine_type) = &self.machine_type {
            footer.push_str(&format!(" · machine {}", machine_type));
        }
        out.push_str(&style(footer).dim().to_string());
        out.push('\n');

        out
    }
}

fn summary_line(step: &StepOutcome) -> String {
    let glyph = step.execution.display_char();
    let duration = format_duration(Duration::from_millis(step.duration_ms));

    match step.execution {
        ExecutionResult::Success => {
            format!("{} {} ({})", style(glyph).green(), step.id, duration)
        }
        ExecutionResult::Failure { .. } => {
            let mut line = format!(
                "{} {}: {}",
                style(glyph).red(),
                step.id,
                step.execution
            );
            if let Some(detail) = &step.detail {
                line.push_str(&format!("\n      {}", style(detail).dim()));
            }
            line
        }
        ExecutionResult::TimedOut => {
            format!("{} {} (timed out after {})", style(glyph).red(), step.id, duration)
        }
        ExecutionResult::Skipped => {
            let reason = step.detail.as_deref().unwrap_or("skipped");
            format!("{} {} ({})", style(glyph).yellow(), step.id, reason)
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{}s", secs, millis / 100)
    } else {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}
