//! Pipeline file discovery and loading.
//!
//! This module handles finding the pipeline file, parsing it, and the
//! small lexical formats that ride along with it (durations, fingerprints).

use crate::config::schema::PipelineConfig;
use crate::error::{GantryError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default pipeline file name.
pub const PIPELINE_FILE: &str = "gantry.yml";

/// A parsed pipeline plus the provenance the run report needs.
#[derive(Debug, Clone)]
pub struct LoadedPipeline {
    /// The parsed pipeline.
    pub config: PipelineConfig,

    /// Where it was loaded from.
    pub path: PathBuf,

    /// Short content digest, recorded in logs and the run report.
    pub fingerprint: String,
}

/// Find the pipeline file by walking up from the given directory.
///
/// Looks for `gantry.yml` in each directory from `start` to the filesystem
/// root, stopping at the first hit. A `.git` directory does not stop the
/// walk; only the pipeline file itself does.
pub fn find_pipeline_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join(PIPELINE_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load and parse a pipeline file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_pipeline(path: &Path) -> Result<LoadedPipeline> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GantryError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            GantryError::Io(e)
        }
    })?;

    let config = parse_pipeline(&content, path)?;

    Ok(LoadedPipeline {
        config,
        path: path.to_path_buf(),
        fingerprint: fingerprint(&content),
    })
}

/// Parse YAML content into a PipelineConfig.
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_pipeline(content: &str, source_path: &Path) -> Result<PipelineConfig> {
    serde_yaml::from_str(content).map_err(|e| GantryError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse a duration string of the form `<number>[ms|s|m|h]`.
///
/// A bare number is taken as seconds, matching the source format's
/// `timeout: 1800s` convention.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let re = regex::Regex::new(r"^(\d+)(ms|s|m|h)?$").map_err(|e| GantryError::Other(e.into()))?;

    let captures = re
        .captures(value.trim())
        .ok_or_else(|| GantryError::InvalidDuration {
            value: value.to_string(),
        })?;

    let amount: u64 = captures[1]
        .parse()
        .map_err(|_| GantryError::InvalidDuration {
            value: value.to_string(),
        })?;

    Ok(match captures.get(2).map(|m| m.as_str()) {
        Some("ms") => Duration::from_millis(amount),
        Some("m") => Duration::from_secs(amount * 60),
        Some("h") => Duration::from_secs(amount * 3600),
        _ => Duration::from_secs(amount),
    })
}

/// Short hex digest of the raw pipeline content.
fn fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..6])
}
