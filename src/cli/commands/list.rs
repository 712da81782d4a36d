//! List command implementation.
//!
//! The `gantry list` command shows steps, their dependencies, and the
//! execution waves the scheduler would dispatch together.

use std::path::{Path, PathBuf};

use console::style;

use crate::cli::args::ListArgs;
use crate::config::{load_pipeline, validate_pipeline};
use crate::error::Result;
use crate::runner::PipelineRunner;

use super::dispatcher::{resolve_pipeline_path, Command, CommandResult};

/// The list command implementation.
pub struct ListCommand {
    working_dir: PathBuf,
    config_override: Option<PathBuf>,
    #[allow(dead_code)]
    args: ListArgs,
}

impl ListCommand {
    /// Create a new list command.
    pub fn new(working_dir: &Path, config_override: Option<PathBuf>, args: ListArgs) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            config_override,
            args,
        }
    }
}

impl Command for ListCommand {
    fn execute(&self) -> Result<CommandResult> {
        let path = resolve_pipeline_path(&self.working_dir, self.config_override.as_deref())?;
        let loaded = load_pipeline(&path)?;

        let issues = validate_pipeline(&loaded.config);
        if !issues.is_empty() {
            for issue in &issues {
                eprintln!("{} {}", style("error:").red().bold(), issue);
            }
            return Ok(CommandResult::failure(2));
        }

        let runner = PipelineRunner::from_loaded(&loaded)?;

        let name = loaded.config.name.as_deref().unwrap_or("pipeline");
        let timeout = loaded
            .config
            .timeout
            .as_deref()
            .unwrap_or("none");
        let machine = match (
            &loaded.config.options.machine_type,
            loaded.config.options.machine_cores(),
        ) {
            (Some(machine_type), Some(cores)) => {
                format!(", machine {} ({} cores)", machine_type, cores)
            }
            (Some(machine_type), None) => format!(", machine {}", machine_type),
            _ => String::new(),
        };
        println!(
            "{} ({} steps, timeout {}{})",
            style(name).bold(),
            runner.steps().len(),
            timeout,
            machine
        );

        for step in runner.steps() {
            let deps = if step.wait_for.is_empty() {
                "starts immediately".to_string()
            } else {
                format!("waits for: {}", step.wait_for.join(", "))
            };
            println!(
                "  {}  {}  {}",
                style(&step.id).bold(),
                style(&step.unit).dim(),
                deps
            );
        }

        let waves = runner.graph().execution_waves()?;
        if !waves.is_empty() {
            println!("\nExecution waves:");
            for (index, wave) in waves.iter().enumerate() {
                println!("  {}. {}", index + 1, wave.join(", "));
            }
        }

        Ok(CommandResult::success())
    }
}
