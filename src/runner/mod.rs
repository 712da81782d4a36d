//! Pipeline orchestration: dependency graph, scheduler, controller, report.

pub mod dependency;
pub mod pipeline;
pub mod report;
pub mod scheduler;

pub use dependency::{DependencyGraph, DependencyGraphBuilder};
pub use pipeline::{PipelineRunner, PipelineStatus};
pub use report::{RunReport, StepOutcome};
pub use scheduler::{SchedulerOutcome, StepRunner};
