//! Process execution for step units.

pub mod command;

pub use command::{
    run_captured, run_streaming, CommandOptions, CommandResult, OutputCallback, OutputLine,
};
