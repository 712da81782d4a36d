//! Run command implementation.
//!
//! The `gantry run` command executes the pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use console::style;

use crate::cli::args::{ReportFormat, RunArgs, RuntimeKind};
use crate::config::{
    load_pipeline, parse_duration, resolve_string, LoadedPipeline, SubstitutionContext,
};
use crate::error::{GantryError, Result};
use crate::runner::PipelineRunner;
use crate::steps::{ContainerRuntime, DockerRuntime, ProcessRuntime, StepExecutor};
use crate::volumes::VolumeSet;

use super::dispatcher::{resolve_pipeline_path, Command, CommandResult};

/// The run command implementation.
pub struct RunCommand {
    working_dir: PathBuf,
    config_override: Option<PathBuf>,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(working_dir: &Path, config_override: Option<PathBuf>, args: RunArgs) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            config_override,
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    fn build_context(&self, loaded: &LoadedPipeline) -> Result<SubstitutionContext> {
        let mut substitutions = loaded.config.substitutions.clone();
        substitutions.extend(parse_substitution_flags(&self.args.substitutions)?);

        let branch = self.args.branch.clone().unwrap_or_default();
        let project_id = self
            .args
            .project
            .clone()
            .or_else(|| {
                self.working_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "local".to_string());
        let build_id = format!(
            "{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            &loaded.fingerprint[..6]
        );

        Ok(SubstitutionContext::new()
            .with_build(&branch, &build_id, &project_id)
            .with_substitutions(substitutions))
    }

    fn dry_run(&self, runner: &PipelineRunner, context: &SubstitutionContext) -> Result<CommandResult> {
        println!("{}", style("dry-run mode: nothing will execute").yellow());

        for id in runner.graph().topological_order()? {
            let Some(step) = runner.steps().iter().find(|s| s.id == id) else {
                continue;
            };

            let args: Vec<String> = step
                .args
                .iter()
                .map(|arg| resolve_string(arg, context))
                .collect::<Result<_>>()?;
            let program = step.entrypoint.as_deref().unwrap_or(&step.unit);

            println!("  {} {} {}", style(&step.id).bold(), program, args.join(" "));
        }

        println!("dry-run complete: {} steps resolved", runner.steps().len());
        Ok(CommandResult::success())
    }
}

/// Parse repeated `KEY=VALUE` substitution flags.
fn parse_substitution_flags(flags: &[String]) -> Result<HashMap<String, String>> {
    let mut substitutions = HashMap::new();

    for flag in flags {
        let (key, value) = flag
            .split_once('=')
            .ok_or_else(|| GantryError::ConfigValidationError {
                message: format!("Substitution '{}' is not of the form KEY=VALUE", flag),
            })?;
        substitutions.insert(key.to_string(), value.to_string());
    }

    Ok(substitutions)
}

impl Command for RunCommand {
    fn execute(&self) -> Result<CommandResult> {
        let path = resolve_pipeline_path(&self.working_dir, self.config_override.as_deref())?;
        let loaded = load_pipeline(&path)?;

        let issues = crate::config::validate_pipeline(&loaded.config);
        if !issues.is_empty() {
            for issue in &issues {
                eprintln!("{} {}", style("error:").red().bold(), issue);
            }
            return Ok(CommandResult::failure(2));
        }

        let mut runner = PipelineRunner::from_loaded(&loaded)?;
        if let Some(timeout) = &self.args.timeout {
            runner = runner.with_timeout(Some(parse_duration(timeout)?));
        }

        let context = self.build_context(&loaded)?;

        if self.args.dry_run {
            return self.dry_run(&runner, &context);
        }

        let volumes = VolumeSet::new()?;
        let runtime: Box<dyn ContainerRuntime> = match self.args.runtime {
            RuntimeKind::Process => Box::new(ProcessRuntime),
            RuntimeKind::Docker => Box::new(DockerRuntime::default()),
        };
        let executor = StepExecutor {
            runtime: runtime.as_ref(),
            context: &context,
            volumes: &volumes,
        };

        let report = runner.run(&executor);

        match self.args.format {
            ReportFormat::Human => println!("{}", report.render_human()),
            ReportFormat::Json => println!("{}", report.render_json()?),
        }

        Ok(if report.is_success() {
            CommandResult::success()
        } else {
            CommandResult::failure(1)
        })
    }
}
