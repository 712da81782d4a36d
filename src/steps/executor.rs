//! Step execution engine.
//!
//! Executes one resolved step: substitution tokens are resolved at
//! dispatch time, volumes are bound, the container runtime assembles the
//! launch, and output streams to the log sink while the global deadline
//! is enforced.

use crate::config::interpolation::{resolve_string, SubstitutionContext};
use crate::error::{GantryError, Result};
use crate::runner::scheduler::StepRunner;
use crate::shell::{run_streaming, CommandOptions, OutputCallback, OutputLine};
use crate::steps::resolved::ResolvedStep;
use crate::steps::runtime::{ContainerRuntime, MountBinding};
use crate::volumes::VolumeSet;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Terminal outcome of one step. Once set it is never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// The step's unit exited zero.
    Success,

    /// The step's unit exited non-zero (or died to a signal).
    Failure { exit_code: Option<i32> },

    /// The step was still running when the global deadline fired.
    TimedOut,

    /// The step never ran: a predecessor did not succeed, or the pipeline
    /// deadline expired first.
    Skipped,
}

impl ExecutionResult {
    /// Whether the step completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success)
    }

    /// Display glyph for report rendering.
    pub fn display_char(&self) -> char {
        match self {
            ExecutionResult::Success => '✓',
            ExecutionResult::Failure { .. } => '✗',
            ExecutionResult::TimedOut => '◷',
            ExecutionResult::Skipped => '⊘',
        }
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionResult::Success => write!(f, "success"),
            ExecutionResult::Failure {
                exit_code: Some(code),
            } => write!(f, "failure (exit code {})", code),
            ExecutionResult::Failure { exit_code: None } => write!(f, "failure"),
            ExecutionResult::TimedOut => write!(f, "timed out"),
            ExecutionResult::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of executing (or skipping) a step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Step id.
    pub id: String,

    /// Terminal outcome.
    pub execution: ExecutionResult,

    /// Execution duration (zero for skipped steps).
    pub duration: Duration,

    /// Failure detail: captured error output, launch error, or skip reason.
    pub detail: Option<String>,
}

impl StepResult {
    /// Create a success result.
    pub fn success(id: &str, duration: Duration) -> Self {
        Self {
            id: id.to_string(),
            execution: ExecutionResult::Success,
            duration,
            detail: None,
        }
    }

    /// Create a failure result.
    pub fn failure(
        id: &str,
        duration: Duration,
        exit_code: Option<i32>,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            execution: ExecutionResult::Failure { exit_code },
            duration,
            detail,
        }
    }

    /// Create a timed-out result.
    pub fn timed_out(id: &str, duration: Duration) -> Self {
        Self {
            id: id.to_string(),
            execution: ExecutionResult::TimedOut,
            duration,
            detail: Some("global deadline exceeded".to_string()),
        }
    }

    /// Create a skipped result with the reason the step never ran.
    pub fn skipped(id: &str, reason: String) -> Self {
        Self {
            id: id.to_string(),
            execution: ExecutionResult::Skipped,
            duration: Duration::ZERO,
            detail: Some(reason),
        }
    }
}

/// Executes steps through the container runtime seam.
///
/// Shared by every scheduler worker thread; all fields are read-only or
/// internally synchronized.
pub struct StepExecutor<'a> {
    /// Launch assembly for the external container runtime.
    pub runtime: &'a dyn ContainerRuntime,

    /// Dispatch-time variable resolution.
    pub context: &'a SubstitutionContext,

    /// Shared volumes for the run.
    pub volumes: &'a VolumeSet,
}

impl StepRunner for StepExecutor<'_> {
    fn run(&self, step: &ResolvedStep, deadline: Option<Instant>) -> StepResult {
        let start = Instant::now();
        info!(step = %step.id, unit = %step.unit, "step starting");

        let result = match self.launch(step, deadline) {
            Ok(result) => result,
            Err(e) => {
                error!(step = %step.id, error = %e, "step could not be launched");
                StepResult::failure(&step.id, start.elapsed(), None, Some(e.to_string()))
            }
        };

        info!(
            step = %step.id,
            outcome = %result.execution,
            duration_ms = result.duration.as_millis() as u64,
            "step finished"
        );
        result
    }
}

impl StepExecutor<'_> {
    fn launch(&self, step: &ResolvedStep, deadline: Option<Instant>) -> Result<StepResult> {
        let start = Instant::now();

        // Substitution happens here, per step, at dispatch time.
        let args: Vec<String> = step
            .args
            .iter()
            .map(|arg| resolve_string(arg, self.context))
            .collect::<Result<_>>()?;

        let mut env = HashMap::new();
        for (key, value) in &step.env {
            env.insert(key.clone(), resolve_string(value, self.context)?);
        }

        let mut mounts = Vec::new();
        for binding in &step.volumes {
            let mount = self.volumes.acquire(&binding.name)?;
            mounts.push(MountBinding {
                name: binding.name.clone(),
                host_path: mount.host_path().to_path_buf(),
                container_path: binding.path.clone(),
            });
        }

        let launch = self.runtime.prepare(step, &args, &env, &mounts)?;
        if launch.program.trim().is_empty() {
            return Err(GantryError::StepLaunchError {
                step: step.id.clone(),
                message: "step has no executable unit".to_string(),
            });
        }

        let id = step.id.clone();
        let callback: OutputCallback = Box::new(move |line| match line {
            OutputLine::Stdout(text) => info!(step = %id, "{text}"),
            OutputLine::Stderr(text) => warn!(step = %id, "{text}"),
        });

        let options = CommandOptions {
            cwd: launch.cwd.clone(),
            env: launch.env.clone(),
        };
        let command = run_streaming(&launch.program, &launch.args, &options, deadline, callback)?;

        let duration = start.elapsed();
        Ok(if command.timed_out {
            StepResult::timed_out(&step.id, duration)
        } else if command.success {
            StepResult::success(&step.id, duration)
        } else {
            StepResult::failure(
                &step.id,
                duration,
                command.exit_code,
                output_tail(&command.stderr),
            )
        })
    }
}

/// Last few lines of captured output, for the failure report.
fn output_tail(output: &str) -> Option<String> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    let tail = if lines.len() > 10 {
        &lines[lines.len() - 10..]
    } else {
        &lines[..]
    };
    Some(tail.join("\n"))
}
