//! Validate command implementation.
//!
//! The `gantry validate` command runs the validation pass standalone.

use std::path::{Path, PathBuf};

use console::style;

use crate::cli::args::ValidateArgs;
use crate::config::{load_pipeline, validate_pipeline};
use crate::error::Result;

use super::dispatcher::{resolve_pipeline_path, Command, CommandResult};

/// The validate command implementation.
pub struct ValidateCommand {
    working_dir: PathBuf,
    config_override: Option<PathBuf>,
    #[allow(dead_code)]
    args: ValidateArgs,
}

impl ValidateCommand {
    /// Create a new validate command.
    pub fn new(working_dir: &Path, config_override: Option<PathBuf>, args: ValidateArgs) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            config_override,
            args,
        }
    }
}

impl Command for ValidateCommand {
    fn execute(&self) -> Result<CommandResult> {
        let path = resolve_pipeline_path(&self.working_dir, self.config_override.as_deref())?;
        let loaded = load_pipeline(&path)?;

        let issues = validate_pipeline(&loaded.config);

        if issues.is_empty() {
            println!(
                "{} {} ({} steps, fingerprint {})",
                style("OK").green().bold(),
                path.display(),
                loaded.config.steps.len(),
                loaded.fingerprint
            );
            return Ok(CommandResult::success());
        }

        for issue in &issues {
            eprintln!("{} {}", style("error:").red().bold(), issue);
        }
        eprintln!(
            "{}: {} issue(s) in {}",
            style("invalid").red(),
            issues.len(),
            path.display()
        );

        Ok(CommandResult::failure(2))
    }
}
