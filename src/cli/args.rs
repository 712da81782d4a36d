//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Gantry - declarative build-pipeline orchestrator.
#[derive(Debug, Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the pipeline file (overrides gantry.yml discovery)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute the pipeline (default if no command specified)
    Run(RunArgs),

    /// Validate the pipeline file without running anything
    Validate(ValidateArgs),

    /// Show steps, dependencies, and execution waves
    List(ListArgs),

    /// Write a starter gantry.yml
    Init(InitArgs),

    /// Print the JSON Schema of the pipeline format
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Styled terminal report
    #[default]
    Human,
    /// Machine-readable JSON report
    Json,
}

/// Which container runtime launches step units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RuntimeKind {
    /// Execute units directly as local processes
    #[default]
    Process,
    /// Render `docker run` invocations
    Docker,
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Substitution values as KEY=VALUE (repeatable)
    #[arg(short, long = "substitution")]
    pub substitutions: Vec<String>,

    /// Override the pipeline timeout (e.g. "300s", "10m")
    #[arg(long)]
    pub timeout: Option<String>,

    /// Branch name exposed as BRANCH_NAME
    #[arg(long, env = "GANTRY_BRANCH")]
    pub branch: Option<String>,

    /// Project id exposed as PROJECT_ID
    #[arg(long, env = "GANTRY_PROJECT")]
    pub project: Option<String>,

    /// Resolve and print step launches without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
    pub format: ReportFormat,

    /// Container runtime used to launch step units
    #[arg(long, value_enum, default_value_t = RuntimeKind::Process)]
    pub runtime: RuntimeKind,
}

/// Arguments for the `validate` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ValidateArgs {}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {}

/// Arguments for the `init` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct InitArgs {
    /// Overwrite an existing gantry.yml
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `schema` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SchemaArgs {}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
