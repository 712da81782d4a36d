//! Pipeline loading, parsing, and validation for Gantry.
//!
//! This module handles all aspects of the declarative pipeline file:
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Validation in [`validator`]
//! - Variable substitution in [`interpolation`]
//!
//! # Example
//!
//! ```
//! use gantry::config::{parse_pipeline, validate};
//! use std::path::Path;
//!
//! let yaml = r#"
//! steps:
//!   - id: hello
//!     unit: alpine
//!     args: [echo, hi]
//! "#;
//!
//! let config = parse_pipeline(yaml, Path::new("gantry.yml")).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.steps.len(), 1);
//! ```

pub mod interpolation;
pub mod loader;
pub mod schema;
pub mod validator;

// Schema re-exports
pub use schema::{
    PipelineConfig, PipelineOptions, StepConfig, StepFragment, VolumeBinding, START_SENTINEL,
};

// Loader re-exports
pub use loader::{
    find_pipeline_file, load_pipeline, parse_duration, parse_pipeline, LoadedPipeline,
    PIPELINE_FILE,
};

// Validator re-exports
pub use validator::{validate, validate_pipeline, ValidationIssue};

// Interpolation re-exports
pub use interpolation::{
    extract_variables, has_placeholders, parse_template, resolve_string, resolve_string_lossy,
    Segment, SubstitutionContext,
};
