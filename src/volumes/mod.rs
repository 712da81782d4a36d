//! Named shared volumes for a pipeline run.
//!
//! Volumes are the only shared mutable resource between steps. A volume is
//! identified by name: two steps binding the same name see the same
//! underlying storage, with visibility ordered by their `wait_for` edges.
//! The orchestrator does not arbitrate concurrent writers without an edge.
//!
//! Storage lives under a per-run temporary root and is released when the
//! [`VolumeSet`] drops, on every exit path including worker panics.

use crate::error::{GantryError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Host-side handle to one named volume.
#[derive(Debug)]
pub struct Mount {
    name: String,
    host_path: PathBuf,
}

impl Mount {
    /// Volume name this mount backs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host directory holding the volume's contents.
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }
}

/// All volumes of one pipeline run.
#[derive(Debug)]
pub struct VolumeSet {
    root: TempDir,
    mounts: Mutex<HashMap<String, Arc<Mount>>>,
}

impl VolumeSet {
    /// Create an empty volume set backed by fresh temporary storage.
    pub fn new() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("gantry-volumes-")
            .tempdir()
            .map_err(|e| GantryError::VolumeError {
                name: "<root>".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            root,
            mounts: Mutex::new(HashMap::new()),
        })
    }

    /// Acquire the mount for a named volume, creating it on first reference.
    ///
    /// Idempotent per name: repeated acquisition from different steps
    /// returns a handle to the same underlying storage.
    pub fn acquire(&self, name: &str) -> Result<Arc<Mount>> {
        let mut mounts = self.lock();

        if let Some(mount) = mounts.get(name) {
            return Ok(Arc::clone(mount));
        }

        let host_path = self.root.path().join(name);
        fs::create_dir_all(&host_path).map_err(|e| GantryError::VolumeError {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        let mount = Arc::new(Mount {
            name: name.to_string(),
            host_path,
        });
        mounts.insert(name.to_string(), Arc::clone(&mount));

        Ok(mount)
    }

    /// Release one named volume and delete its storage.
    pub fn release(&self, name: &str) -> Result<()> {
        let Some(mount) = self.lock().remove(name) else {
            return Ok(());
        };

        fs::remove_dir_all(mount.host_path()).map_err(|e| GantryError::VolumeError {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Names of all currently acquired volumes, sorted.
    pub fn acquired(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of acquired volumes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no volume has been acquired yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A worker panicking while holding the lock must not wedge release for
    // the rest of the run.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mount>>> {
        self.mounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_storage_lazily() {
        let volumes = VolumeSet::new().unwrap();
        assert!(volumes.is_empty());

        let mount = volumes.acquire("cache").unwrap();
        assert!(mount.host_path().is_dir());
        assert_eq!(mount.name(), "cache");
        assert_eq!(volumes.len(), 1);
    }

    #[test]
    fn acquire_is_idempotent_per_name() {
        let volumes = VolumeSet::new().unwrap();

        let first = volumes.acquire("cache").unwrap();
        let second = volumes.acquire("cache").unwrap();

        assert_eq!(first.host_path(), second.host_path());
        assert_eq!(volumes.len(), 1);
    }

    #[test]
    fn different_names_get_different_storage() {
        let volumes = VolumeSet::new().unwrap();

        let cache = volumes.acquire("cache").unwrap();
        let config = volumes.acquire("config").unwrap();

        assert_ne!(cache.host_path(), config.host_path());
        assert_eq!(volumes.acquired(), vec!["cache", "config"]);
    }

    #[test]
    fn writes_are_visible_through_any_handle() {
        let volumes = VolumeSet::new().unwrap();

        let writer = volumes.acquire("shared").unwrap();
        fs::write(writer.host_path().join("build-number.txt"), "41").unwrap();

        let reader = volumes.acquire("shared").unwrap();
        let content = fs::read_to_string(reader.host_path().join("build-number.txt")).unwrap();
        assert_eq!(content, "41");
    }

    #[test]
    fn release_deletes_storage() {
        let volumes = VolumeSet::new().unwrap();
        let mount = volumes.acquire("cache").unwrap();
        let path = mount.host_path().to_path_buf();

        volumes.release("cache").unwrap();
        assert!(!path.exists());
        assert!(volumes.is_empty());
    }

    #[test]
    fn release_of_unknown_volume_is_a_no_op() {
        let volumes = VolumeSet::new().unwrap();
        assert!(volumes.release("never-acquired").is_ok());
    }

    #[test]
    fn drop_releases_all_storage() {
        let path = {
            let volumes = VolumeSet::new().unwrap();
            volumes.acquire("a").unwrap();
            volumes.acquire("b").unwrap();
            volumes.root.path().to_path_buf()
        };

        assert!(!path.exists());
    }
}
