//! Container runtime seam.
//!
//! The actual container runtime is an external collaborator. Gantry only
//! assembles the launch command for a step's unit; it never manages images
//! or talks to a daemon API. [`ProcessRuntime`] executes units directly as
//! local processes (the default, and what the test suite uses);
//! [`DockerRuntime`] renders a `docker run` invocation.

use crate::error::Result;
use crate::steps::resolved::ResolvedStep;
use std::collections::HashMap;
use std::path::PathBuf;

/// One volume bound into a step's launch.
#[derive(Debug, Clone)]
pub struct MountBinding {
    /// Volume name.
    pub name: String,

    /// Host directory backing the volume.
    pub host_path: PathBuf,

    /// Mount path inside the step's unit.
    pub container_path: String,
}

/// A fully assembled process launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

/// Narrow interface to the external container runtime.
pub trait ContainerRuntime: Send + Sync {
    /// Assemble the launch command for a step whose args and env are
    /// already substitution-resolved.
    fn prepare(
        &self,
        step: &ResolvedStep,
        args: &[String],
        env: &HashMap<String, String>,
        mounts: &[MountBinding],
    ) -> Result<LaunchSpec>;
}

/// Executes units directly as local processes.
///
/// Volumes cannot be bind-mounted without a container boundary, so each
/// mount is exported as `GANTRY_VOLUME_<NAME>` pointing at the host
/// directory, and the step's command reads/writes through that path.
#[derive(Debug, Default)]
pub struct ProcessRuntime;

/// Env var name a mount is exported under in process mode.
pub fn volume_env_var(name: &str) -> String {
    format!(
        "GANTRY_VOLUME_{}",
        name.to_ascii_uppercase().replace('-', "_")
    )
}

impl ContainerRuntime for ProcessRuntime {
    fn prepare(
        &self,
        step: &ResolvedStep,
        args: &[String],
        env: &HashMap<String, String>,
        mounts: &[MountBinding],
    ) -> Result<LaunchSpec> {
        let program = step
            .entrypoint
            .clone()
            .unwrap_or_else(|| step.unit.clone());

        let mut env = env.clone();
        for mount in mounts {
            env.insert(
                volume_env_var(&mount.name),
                mount.host_path.display().to_string(),
            );
        }

        Ok(LaunchSpec {
            program,
            args: args.to_vec(),
            env,
            cwd: None,
        })
    }
}

/// Renders a `docker run` invocation for the step.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    /// Docker client binary.
    pub binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl ContainerRuntime for DockerRuntime {
    fn prepare(
        &self,
        step: &ResolvedStep,
        args: &[String],
        env: &HashMap<String, String>,
        mounts: &[MountBinding],
    ) -> Result<LaunchSpec> {
        let mut argv = vec!["run".to_string(), "--rm".to_string()];

        if let Some(entrypoint) = &step.entrypoint {
            argv.push("--entrypoint".to_string());
            argv.push(entrypoint.clone());
        }

        // Sorted for a stable argv; docker does not care, logs do.
        let mut env_pairs: Vec<_> = env.iter().collect();
        env_pairs.sort();
        for (key, value) in env_pairs {
            argv.push("-e".to_string());
            argv.push(format!("{}={}", key, value));
        }

        for mount in mounts {
            argv.push("-v".to_string());
            argv.push(format!(
                "{}:{}",
                mount.host_path.display(),
                mount.container_path
            ));
        }

        argv.push(step.unit.clone());
        argv.extend(args.iter().cloned());

        Ok(LaunchSpec {
            program: self.binary.clone(),
            args: argv,
            env: HashMap::new(),
            cwd: None,
        })
    }
}
