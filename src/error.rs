//! Error types for Gantry operations.
//!
//! This module defines [`GantryError`], the primary error type used throughout
//! the orchestrator, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `GantryError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `GantryError::Other`) for unexpected errors
//! - Validation errors are raised before any step executes; runtime step
//!   failures are not errors at all but terminal execution results

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Gantry operations.
#[derive(Debug, Error)]
pub enum GantryError {
    /// Pipeline file not found at expected location.
    #[error("Pipeline file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse the pipeline file.
    #[error("Failed to parse pipeline at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid pipeline structure or values.
    #[error("Invalid pipeline: {message}")]
    ConfigValidationError { message: String },

    /// A step waits on an id that no declared step carries.
    #[error("Step '{step}' waits for unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// Referenced fragment does not exist.
    #[error("Unknown fragment: {name}")]
    UnknownFragment { name: String },

    /// Dependency cycle in the wait_for graph.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// A substitution token could not be resolved at dispatch time.
    #[error("Unresolved variable: ${{{name}}}")]
    UnresolvedVariable { name: String },

    /// Malformed duration string (expects e.g. "1800s", "30m", "2h").
    #[error("Invalid duration: '{value}'")]
    InvalidDuration { value: String },

    /// A step's execution unit could not be launched.
    #[error("Step '{step}' could not be launched: {message}")]
    StepLaunchError { step: String, message: String },

    /// Volume storage could not be provisioned or released.
    #[error("Volume '{name}': {message}")]
    VolumeError { name: String, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Gantry operations.
pub type Result<T> = std::result::Result<T, GantryError>;
