//! Pipeline validation rules.
//!
//! This module validates a pipeline for correctness before anything runs:
//! - Step ids must be unique
//! - `wait_for` must reference declared steps (or the start sentinel)
//! - `extends` must reference declared fragments
//! - Volume bindings must carry valid names and absolute mount paths
//! - Every step needs an execution unit
//! - The dependency graph must be acyclic
//!
//! Validation is a pure function of the pipeline: same input, same issues,
//! and nothing executes when it fails.

use crate::config::loader::parse_duration;
use crate::config::schema::{PipelineConfig, START_SENTINEL};
use crate::error::{GantryError, Result};
use std::collections::{HashMap, HashSet};

/// Validation issue with context.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Step id if the issue is step-specific
    pub step: Option<String>,
}

impl ValidationIssue {
    fn new(rule: &str, message: String, step: Option<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            step,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.rule, self.message)
    }
}

/// Validate a pipeline and return all issues.
///
/// Collects every issue rather than stopping at the first one, so the
/// pipeline author can fix the whole file in one pass.
pub fn validate_pipeline(config: &PipelineConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    issues.extend(validate_timeout(config));
    issues.extend(validate_ids(config));
    issues.extend(validate_units(config));
    issues.extend(validate_fragments(config));
    issues.extend(validate_volumes(config));
    let dependency_issues = validate_dependencies(config);
    let dependencies_ok = dependency_issues.is_empty();
    issues.extend(dependency_issues);

    // A cycle check over a graph with unknown or duplicate ids would
    // produce misleading paths, so it only runs on a well-formed graph.
    if dependencies_ok && !issues.iter().any(|i| i.rule == "duplicate-id") {
        issues.extend(validate_acyclic(config));
    }

    issues
}

fn validate_timeout(config: &PipelineConfig) -> Vec<ValidationIssue> {
    let Some(timeout) = &config.timeout else {
        return Vec::new();
    };

    match parse_duration(timeout) {
        Ok(_) => Vec::new(),
        Err(_) => vec![ValidationIssue::new(
            "invalid-timeout",
            format!("Timeout '{}' is not a valid duration", timeout),
            None,
        )],
    }
}

fn validate_ids(config: &PipelineConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for step in &config.steps {
        if let Some(id) = &step.id {
            if id.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    "duplicate-id",
                    "Step id must not be empty".to_string(),
                    None,
                ));
            } else if !seen.insert(id.clone()) {
                issues.push(ValidationIssue::new(
                    "duplicate-id",
                    format!("Step id '{}' is declared more than once", id),
                    Some(id.clone()),
                ));
            }
        }
    }

    issues
}

fn validate_units(config: &PipelineConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (index, step) in config.steps.iter().enumerate() {
        let id = step.effective_id(index);

        let fragment_unit = step
            .extends
            .as_ref()
            .and_then(|name| config.fragments.get(name))
            .and_then(|f| f.unit.as_ref());

        if step.unit.as_deref().map_or(true, |u| u.trim().is_empty()) && fragment_unit.is_none() {
            issues.push(ValidationIssue::new(
                "missing-unit",
                format!("Step '{}' has no execution unit", id),
                Some(id),
            ));
        }
    }

    issues
}

fn validate_fragments(config: &PipelineConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (index, step) in config.steps.iter().enumerate() {
        if let Some(fragment) = &step.extends {
            if !config.fragments.contains_key(fragment) {
                let id = step.effective_id(index);
                issues.push(ValidationIssue::new(
                    "unknown-fragment",
                    format!("Step '{}' extends unknown fragment '{}'", id, fragment),
                    Some(id),
                ));
            }
        }
    }

    issues
}

fn valid_volume_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && name != START_SENTINEL
}

fn validate_volumes(config: &PipelineConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (index, step) in config.steps.iter().enumerate() {
        let id = step.effective_id(index);
        let mut seen = HashSet::new();

        for binding in &step.volumes {
            if !valid_volume_name(&binding.name) {
                issues.push(ValidationIssue::new(
                    "malformed-volume",
                    format!("Step '{}' declares invalid volume name '{}'", id, binding.name),
                    Some(id.clone()),
                ));
            } else if !seen.insert(binding.name.clone()) {
                issues.push(ValidationIssue::new(
                    "malformed-volume",
                    format!("Step '{}' binds volume '{}' twice", id, binding.name),
                    Some(id.clone()),
                ));
            }

            if !binding.path.starts_with('/') {
                issues.push(ValidationIssue::new(
                    "malformed-volume",
                    format!(
                        "Step '{}' mounts volume '{}' at non-absolute path '{}'",
                        id, binding.name, binding.path
                    ),
                    Some(id.clone()),
                ));
            }
        }
    }

    issues
}

fn validate_dependencies(config: &PipelineConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let declared: HashSet<String> = config.step_ids().into_iter().collect();

    for (index, step) in config.steps.iter().enumerate() {
        let id = step.effective_id(index);

        for dep in &step.wait_for {
            if dep == START_SENTINEL {
                continue;
            }
            if dep == &id {
                issues.push(ValidationIssue::new(
                    "self-dependency",
                    format!("Step '{}' waits for itself", id),
                    Some(id.clone()),
                ));
            } else if !declared.contains(dep) {
                issues.push(ValidationIssue::new(
                    "unknown-dependency",
                    format!("Step '{}' waits for unknown step '{}'", id, dep),
                    Some(id.clone()),
                ));
            }
        }
    }

    issues
}

fn validate_acyclic(config: &PipelineConfig) -> Vec<ValidationIssue> {
    let ids = config.step_ids();
    let mut predecessors: HashMap<String, Vec<String>> = HashMap::new();

    for (index, step) in config.steps.iter().enumerate() {
        predecessors.insert(ids[index].clone(), step.effective_wait_for(&ids[..index]));
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for id in &ids {
        if let Some(cycle) = detect_cycle(id, &predecessors, &mut visited, &mut rec_stack, &mut path)
        {
            return vec![ValidationIssue::new(
                "circular-dependency",
                format!("Circular dependency detected: {}", cycle),
                Some(id.clone()),
            )];
        }
    }

    Vec::new()
}

fn detect_cycle(
    id: &str,
    predecessors: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<String> {
    if rec_stack.contains(id) {
        let cycle_start = path.iter().position(|s| s == id)?;
        let cycle: Vec<_> = path[cycle_start..].to_vec();
        return Some(format!("{} -> {}", cycle.join(" -> "), id));
    }

    if visited.contains(id) {
        return None;
    }

    visited.insert(id.to_string());
    rec_stack.insert(id.to_string());
    path.push(id.to_string());

    if let Some(deps) = predecessors.get(id) {
        for dep in deps {
            if let Some(cycle) = detect_cycle(dep, predecessors, visited, rec_stack, path) {
                return Some(cycle);
            }
        }
    }

    path.pop();
    rec_stack.remove(id);
    None
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` joining every issue's message.
pub fn validate(config: &PipelineConfig) -> Result<()> {
    let issues = validate_pipeline(config);

    if issues.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = issues.iter().map(|i| i.message.clone()).collect();
        Err(GantryError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
