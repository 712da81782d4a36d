//! Pipeline schema definitions for Gantry.
//!
//! This module contains all the struct definitions that map to
//! the YAML pipeline file format.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root structure for gantry.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipeline name (for display purposes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Global wall-clock bound for the whole run, e.g. "1800s", "30m"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Execution environment options
    pub options: PipelineOptions,

    /// Pipeline-scope substitution variables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub substitutions: HashMap<String, String>,

    /// Reusable step field blocks, referenced by `extends`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fragments: HashMap<String, StepFragment>,

    /// Ordered step list
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    /// Ids of all declared steps, generated ones included, in declaration order.
    pub fn step_ids(&self) -> Vec<String> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| step.effective_id(index))
            .collect()
    }
}

/// Execution environment options for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineOptions {
    /// Resource profile selector, e.g. "e2-highcpu-8"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
}

impl PipelineOptions {
    /// Core count implied by the machine profile, when the profile name
    /// carries one (trailing digits, e.g. "e2-highcpu-8" -> 8).
    pub fn machine_cores(&self) -> Option<u32> {
        let machine_type = self.machine_type.as_deref()?;
        let re = regex::Regex::new(r"(\d+)$").ok()?;
        re.captures(machine_type)?.get(1)?.as_str().parse().ok()
    }
}

/// Configuration for a single pipeline step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StepConfig {
    /// Step id, unique when present. Steps without an id get a positional
    /// one ("step-3") and cannot be referenced from `wait_for`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Execution unit reference (container image or tool identifier)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Entrypoint override for the unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    /// Ordered argument list (supports ${VAR} substitution)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment variables (values support ${VAR} substitution)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Named shared volumes bound into this step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeBinding>,

    /// Ids of predecessor steps. May contain the legacy sentinel '-',
    /// which normalizes to `starts_immediately`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wait_for: Vec<String>,

    /// Start as soon as the pipeline does, with no implicit predecessors
    #[serde(default, skip_serializing_if = "is_false")]
    pub starts_immediately: bool,

    /// Fragment whose fields seed this step's defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Record a failure but treat this step as satisfied for dependents
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_failure: bool,
}

impl StepConfig {
    /// The id this step is addressed by: the declared one, or a positional
    /// fallback derived from its index in the step list.
    pub fn effective_id(&self, index: usize) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("step-{}", index + 1))
    }

    /// Whether `wait_for` carries the legacy "no dependency" sentinel.
    pub fn has_start_sentinel(&self) -> bool {
        self.wait_for.iter().any(|w| w == START_SENTINEL)
    }

    /// The predecessor ids this step actually waits on.
    ///
    /// Explicit `wait_for` entries win (sentinel filtered, duplicates
    /// dropped). With no explicit entries, a step marked
    /// `starts_immediately` (or carrying the sentinel) waits on nothing;
    /// any other step implicitly waits on every previously declared step.
    pub fn effective_wait_for(&self, prior_ids: &[String]) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let explicit: Vec<String> = self
            .wait_for
            .iter()
            .filter(|w| w.as_str() != START_SENTINEL)
            .filter(|w| seen.insert(w.to_string()))
            .cloned()
            .collect();

        if !explicit.is_empty() {
            explicit
        } else if self.starts_immediately || self.has_start_sentinel() {
            Vec::new()
        } else {
            prior_ids.to_vec()
        }
    }
}

/// Legacy `wait_for` entry meaning "no dependency, start immediately".
pub const START_SENTINEL: &str = "-";

/// A named volume bound into a step at a mount path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VolumeBinding {
    /// Volume name; equal names across steps share the same storage
    pub name: String,

    /// Absolute mount path inside the step's execution unit
    pub path: String,
}

/// A reusable block of step fields.
///
/// Fragments are deep-copied into each referencing step at load time;
/// a step's own fields override the fragment's.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StepFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeBinding>,
}

fn is_false(v: &bool) -> bool {
    !v
}
