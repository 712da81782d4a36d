//! Schema command implementation.
//!
//! The `gantry schema` command prints the JSON Schema of the pipeline
//! file format, for editor integration and config linting.

use crate::cli::args::SchemaArgs;
use crate::config::PipelineConfig;
use crate::error::{GantryError, Result};

use super::dispatcher::{Command, CommandResult};

/// The schema command implementation.
pub struct SchemaCommand {
    #[allow(dead_code)]
    args: SchemaArgs,
}

impl SchemaCommand {
    /// Create a new schema command.
    pub fn new(args: SchemaArgs) -> Self {
        Self { args }
    }
}

impl Command for SchemaCommand {
    fn execute(&self) -> Result<CommandResult> {
        let schema = schemars::schema_for!(PipelineConfig);
        let json =
            serde_json::to_string_pretty(&schema).map_err(|e| GantryError::Other(e.into()))?;
        println!("{}", json);
        Ok(CommandResult::success())
    }
}
