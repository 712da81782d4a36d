//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::config::{find_pipeline_file, PIPELINE_FILE};
use crate::error::{GantryError, Result};

/// Trait for command implementations.
pub trait Command {
    /// Execute the command.
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Resolve the pipeline file: an explicit `--config` path wins, otherwise
/// discovery walks up from the working directory.
pub fn resolve_pipeline_path(
    working_dir: &Path,
    config_override: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = config_override {
        return Ok(path.to_path_buf());
    }

    find_pipeline_file(working_dir).ok_or_else(|| GantryError::ConfigNotFound {
        path: working_dir.join(PIPELINE_FILE),
    })
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    working_dir: PathBuf,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given working directory.
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Dispatch and execute a command.
    ///
    /// With no subcommand, `run` with default arguments is assumed.
    pub fn dispatch(&self, cli: &Cli) -> Result<CommandResult> {
        let config = cli.config.clone();

        match &cli.command {
            Some(Commands::Run(args)) => {
                let cmd = super::run::RunCommand::new(&self.working_dir, config, args.clone());
                cmd.execute()
            }
            None => {
                let cmd =
                    super::run::RunCommand::new(&self.working_dir, config, RunArgs::default());
                cmd.execute()
            }
            Some(Commands::Validate(args)) => {
                let cmd =
                    super::validate::ValidateCommand::new(&self.working_dir, config, args.clone());
                cmd.execute()
            }
            Some(Commands::List(args)) => {
                let cmd = super::list::ListCommand::new(&self.working_dir, config, args.clone());
                cmd.execute()
            }
            Some(Commands::Init(args)) => {
                let cmd = super::init::InitCommand::new(&self.working_dir, args.clone());
                cmd.execute()
            }
            Some(Commands::Schema(args)) => {
                let cmd = super::schema::SchemaCommand::new(args.clone());
                cmd.execute()
            }
            Some(Commands::Completions(args)) => {
                let cmd = super::completions::CompletionsCommand::new(args.clone());
                cmd.execute()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure_carries_code() {
        let result = CommandResult::failure(2);
        assert!(!result.success);
        assert_eq!(result.exit_code, 2);
    }

    #[test]
    fn resolve_pipeline_path_prefers_override() {
        let temp = TempDir::new().unwrap();
        let explicit = temp.path().join("ci.yml");

        let path = resolve_pipeline_path(temp.path(), Some(&explicit)).unwrap();
        assert_eq!(path, explicit);
    }

    #[test]
    fn resolve_pipeline_path_discovers_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PIPELINE_FILE), "steps: []").unwrap();

        let path = resolve_pipeline_path(temp.path(), None).unwrap();
        assert_eq!(path, temp.path().join(PIPELINE_FILE));
    }

    #[test]
    fn resolve_pipeline_path_errors_when_missing() {
        let temp = TempDir::new().unwrap();
        let result = resolve_pipeline_path(temp.path(), None);
        assert!(matches!(result, Err(GantryError::ConfigNotFound { .. })));
    }

    #[test]
    fn dispatcher_remembers_working_dir() {
        let dispatcher = CommandDispatcher::new(PathBuf::from("/work"));
        assert_eq!(dispatcher.working_dir(), Path::new("/work"));
    }
}
