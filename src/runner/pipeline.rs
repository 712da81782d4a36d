//! Pipeline controller: the top-level driver of a run.
//!
//! `PipelineRunner` builds the DAG from a parsed pipeline (rejecting it
//! before any side effect when validation fails), then drives the run
//! through `Pending -> Running -> {Succeeded, Failed, TimedOut}`: it
//! computes the absolute deadline, invokes the scheduler, and folds the
//! per-step results into the final state and a [`RunReport`].

use crate::config::loader::{parse_duration, LoadedPipeline};
use crate::config::schema::PipelineConfig;
use crate::config::validator::validate;
use crate::error::Result;
use crate::runner::dependency::DependencyGraph;
use crate::runner::report::{RunReport, StepOutcome};
use crate::runner::scheduler::{self, SchedulerOutcome, StepRunner};
use crate::steps::{resolve_steps, ExecutionResult, ResolvedStep};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Lifecycle state of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Built but not started.
    Pending,

    /// Steps are being scheduled and executed.
    Running,

    /// Every step resolved Success (or an allowed failure).
    Succeeded,

    /// At least one step failed or was skipped because of a failure.
    Failed,

    /// The global deadline fired before the DAG resolved.
    TimedOut,
}

impl PipelineStatus {
    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Succeeded | PipelineStatus::Failed | PipelineStatus::TimedOut
        )
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Succeeded => "succeeded",
            PipelineStatus::Failed => "failed",
            PipelineStatus::TimedOut => "timed out",
        };
        write!(f, "{}", s)
    }
}

/// Top-level driver: owns the resolved DAG and runs it to completion.
pub struct PipelineRunner {
    name: Option<String>,
    steps: Vec<ResolvedStep>,
    graph: DependencyGraph,
    timeout: Option<Duration>,
    fingerprint: String,
    machine_type: Option<String>,
}

impl PipelineRunner {
    /// Build a runner from a loaded pipeline file.
    pub fn from_loaded(loaded: &LoadedPipeline) -> Result<Self> {
        Self::from_config(&loaded.config, &loaded.fingerprint)
    }

    /// Build a runner from a parsed pipeline.
    ///
    /// Validation failures (including dependency cycles) surface here,
    /// before anything executes.
    pub fn from_config(config: &PipelineConfig, fingerprint: &str) -> Result<Self> {
        validate(config)?;

        let steps = resolve_steps(config)?;

        let mut builder = DependencyGraph::builder();
        for step in &steps {
            builder = builder.add_step(step.id.clone(), step.wait_for.clone());
        }
        let graph = builder.build()?;

        // Cycle rejection before any execution. The validator already ran
        // the same check on the raw config; this one covers the resolved
        // graph the scheduler will actually walk.
        graph.topological_order()?;

        let timeout = config
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()?;

        Ok(Self {
            name: config.name.clone(),
            steps,
            graph,
            timeout,
            fingerprint: fingerprint.to_string(),
            machine_type: config.options.machine_type.clone(),
        })
    }

    /// Override the pipeline's timeout (e.g. from a CLI flag).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.timeout = timeout;
        }
        self
    }

    /// The resolved steps, in declaration order.
    pub fn steps(&self) -> &[ResolvedStep] {
        &self.steps
    }

    /// The dependency graph the scheduler walks.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The effective global timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run the pipeline to a terminal state.
    pub fn run(&self, runner: &dyn StepRunner) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            pipeline = self.name.as_deref().unwrap_or("<unnamed>"),
            steps = self.steps.len(),
            timeout = ?self.timeout,
            machine_type = self.machine_type.as_deref().unwrap_or("default"),
            "pipeline {}",
            PipelineStatus::Running,
        );

        let deadline = self.timeout.map(|t| start + t);
        let outcome = scheduler::execute(&self.steps, &self.graph, runner, deadline);

        let status = self.fold_status(&outcome);
        let duration = start.elapsed();
        info!(status = %status, duration_ms = duration.as_millis() as u64, "pipeline finished");

        let units: HashMap<&str, &str> = self
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s.unit.as_str()))
            .collect();

        RunReport {
            name: self.name.clone(),
            status,
            fingerprint: self.fingerprint.clone(),
            machine_type: self.machine_type.clone(),
            started_at,
            finished_at: Utc::now(),
            duration_ms: duration.as_millis() as u64,
            steps: outcome
                .results
                .iter()
                .map(|r| StepOutcome {
                    id: r.id.clone(),
                    unit: units.get(r.id.as_str()).unwrap_or(&"").to_string(),
                    execution: r.execution,
                    duration_ms: r.duration.as_millis() as u64,
                    detail: r.detail.clone(),
                })
                .collect(),
        }
    }

    fn fold_status(&self, outcome: &SchedulerOutcome) -> PipelineStatus {
        let timed_out = outcome.deadline_expired
            || outcome
                .results
                .iter()
                .any(|r| r.execution == ExecutionResult::TimedOut);
        if timed_out {
            return PipelineStatus::TimedOut;
        }

        let allowed: HashMap<&str, bool> = self
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s.allow_failure))
            .collect();

        let clean = outcome.results.iter().all(|r| match r.execution {
            ExecutionResult::Success => true,
            ExecutionResult::Failure { .. } => {
                allowed.get(r.id.as_str()).copied().unwrap_or(false)
            }
            _ => false,
        });

        if clean {
            PipelineStatus::Succeeded
        } else {
            PipelineStatus::Failed
        }
    }
}
