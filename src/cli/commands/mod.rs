//! CLI subcommand implementations.

pub mod completions;
pub mod dispatcher;
pub mod init;
pub mod list;
pub mod run;
pub mod schema;
pub mod validate;

pub use dispatcher::{resolve_pipeline_path, Command, CommandDispatcher, CommandResult};
