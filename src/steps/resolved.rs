//! Resolved step ready for scheduling.
//!
//! A ResolvedStep combines fragment defaults with the step's own config,
//! normalizes the legacy start sentinel, and materializes implicit
//! dependencies, producing a fully-specified unit the scheduler and
//! executor consume.

use crate::config::schema::{PipelineConfig, StepConfig, StepFragment, VolumeBinding};
use crate::error::{GantryError, Result};
use std::collections::HashMap;

/// A fully resolved step ready for scheduling and execution.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    /// Step id (declared, or positional for anonymous steps).
    pub id: String,

    /// Execution unit reference (container image / tool identifier).
    pub unit: String,

    /// Entrypoint override.
    pub entrypoint: Option<String>,

    /// Argument list, still carrying substitution tokens.
    pub args: Vec<String>,

    /// Environment variables, still carrying substitution tokens.
    pub env: HashMap<String, String>,

    /// Volume bindings.
    pub volumes: Vec<VolumeBinding>,

    /// Effective predecessor ids (explicit edges, or the implicit serial
    /// dependency on every prior step).
    pub wait_for: Vec<String>,

    /// Whether the step was declared to start with the pipeline.
    pub starts_immediately: bool,

    /// A failure is recorded but treated as satisfied for dependents.
    pub allow_failure: bool,
}

impl ResolvedStep {
    /// Resolve one step against its optional fragment.
    ///
    /// The fragment is deep-copied: its fields seed the step's defaults and
    /// the step's own fields win. Env maps merge key-wise; volumes merge by
    /// name; args are replaced, not appended.
    pub fn from_config(
        index: usize,
        config: &StepConfig,
        fragment: Option<&StepFragment>,
        prior_ids: &[String],
    ) -> Self {
        let starts_immediately = config.starts_immediately || config.has_start_sentinel();

        let (frag_unit, frag_entrypoint, frag_args, frag_env, frag_volumes) = match fragment {
            Some(f) => (
                f.unit.clone(),
                f.entrypoint.clone(),
                f.args.clone(),
                f.env.clone(),
                f.volumes.clone(),
            ),
            None => (None, None, Vec::new(), HashMap::new(), Vec::new()),
        };

        Self {
            id: config.effective_id(index),
            unit: config.unit.clone().or(frag_unit).unwrap_or_default(),
            entrypoint: config.entrypoint.clone().or(frag_entrypoint),
            args: if config.args.is_empty() {
                frag_args
            } else {
                config.args.clone()
            },
            env: merge_env(&frag_env, &config.env),
            volumes: merge_volumes(&frag_volumes, &config.volumes),
            wait_for: config.effective_wait_for(prior_ids),
            starts_immediately,
            allow_failure: config.allow_failure,
        }
    }
}

/// Resolve every step of a validated pipeline, in declaration order.
///
/// # Errors
///
/// Returns `UnknownFragment` when a step extends a fragment the pipeline
/// does not declare (the validator reports the same condition with context).
pub fn resolve_steps(config: &PipelineConfig) -> Result<Vec<ResolvedStep>> {
    let ids = config.step_ids();
    let mut resolved = Vec::with_capacity(config.steps.len());

    for (index, step) in config.steps.iter().enumerate() {
        let fragment = match &step.extends {
            Some(name) => Some(config.fragments.get(name).ok_or_else(|| {
                GantryError::UnknownFragment { name: name.clone() }
            })?),
            None => None,
        };

        resolved.push(ResolvedStep::from_config(
            index,
            step,
            fragment,
            &ids[..index],
        ));
    }

    Ok(resolved)
}

fn merge_env(
    fragment_env: &HashMap<String, String>,
    step_env: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut result = fragment_env.clone();
    result.extend(step_env.iter().map(|(k, v)| (k.clone(), v.clone())));
    result
}

fn merge_volumes(fragment_volumes: &[VolumeBinding], step_volumes: &[VolumeBinding]) -> Vec<VolumeBinding> {
    let mut result: Vec<VolumeBinding> = fragment_volumes
        .iter()
        .filter(|f| step_volumes.iter().all(|s| s.name != f.name))
        .cloned()
        .collect();
    result.extend(step_volumes.iter().cloned());
    result
}
