//! Gantry - declarative build-pipeline orchestrator.
//!
//! Gantry loads a YAML pipeline file describing containerized build steps,
//! validates it into a DAG, and executes the steps concurrently with shared
//! volumes, dependency edges (`wait_for`), dispatch-time variable
//! substitution, and a global deadline.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Pipeline loading, parsing, validation, substitution
//! - [`error`] - Error types and result aliases
//! - [`runner`] - Dependency graph, scheduler, controller, run report
//! - [`shell`] - Process execution with streaming and deadlines
//! - [`steps`] - Step resolution, execution, container runtime seam
//! - [`volumes`] - Named shared volumes for a run
//!
//! # Example
//!
//! ```
//! use gantry::config::{SubstitutionContext, resolve_string};
//!
//! // Resolve variables in a step argument
//! let mut ctx = SubstitutionContext::new();
//! ctx.substitutions.insert("_BUCKET".to_string(), "gs://artifacts".to_string());
//! let arg = resolve_string("cp app.apk ${_BUCKET}/", &ctx).unwrap();
//! assert_eq!(arg, "cp app.apk gs://artifacts/");
//! ```
//!
//! For end-to-end pipeline execution, see the integration tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod shell;
pub mod steps;
pub mod volumes;

pub use error::{GantryError, Result};
