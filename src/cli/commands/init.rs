//! Init command implementation.
//!
//! The `gantry init` command writes the embedded starter pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use include_dir::{include_dir, Dir};

use crate::cli::args::InitArgs;
use crate::config::PIPELINE_FILE;
use crate::error::{GantryError, Result};

use super::dispatcher::{Command, CommandResult};

static TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// The init command implementation.
pub struct InitCommand {
    working_dir: PathBuf,
    args: InitArgs,
}

impl InitCommand {
    /// Create a new init command.
    pub fn new(working_dir: &Path, args: InitArgs) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            args,
        }
    }
}

impl Command for InitCommand {
    fn execute(&self) -> Result<CommandResult> {
        let target = self.working_dir.join(PIPELINE_FILE);

        if target.exists() && !self.args.force {
            eprintln!(
                "{} {} already exists (use --force to overwrite)",
                style("error:").red().bold(),
                target.display()
            );
            return Ok(CommandResult::failure(2));
        }

        let starter = TEMPLATES
            .get_file(PIPELINE_FILE)
            .and_then(|f| f.contents_utf8())
            .ok_or_else(|| GantryError::ConfigValidationError {
                message: "embedded starter pipeline is missing".to_string(),
            })?;

        fs::write(&target, starter)?;
        println!("{} {}", style("Created").green().bold(), target.display());

        Ok(CommandResult::success())
    }
}
