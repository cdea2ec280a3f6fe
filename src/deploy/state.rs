//! Deploy state persistence and single-deploy locking
//!
//! The state file carries the fingerprint baseline the rebuild decision compares
//! against, plus a record of what was last published and staged. The lock file
//! serializes deploys of one target: interleaved partial updates to the
//! fingerprint/image state are never acceptable, so a second concurrent deploy
//! fails fast instead of waiting.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{DeployError, DeployResult};

const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "deploy.lock";

/// Persisted pipeline state for one deployment target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployState {
    /// Combined fingerprint of the watched inputs at the last successful publish.
    /// `None` until the first publish succeeds; a failed publish never writes it.
    pub baseline_fingerprint: Option<String>,
    /// Version tag of the last successful publish.
    pub last_published_version: Option<String>,
    /// Usage plan recorded as live for the gateway stage, when the gateway exists.
    pub staged_plan: Option<String>,
}

/// Filesystem-backed store for [`DeployState`].
#[derive(Debug, Clone)]
pub struct DeployStateStore {
    dir: PathBuf,
}

impl DeployStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Load the recorded state; a missing file is an empty baseline, not an error.
    pub fn load(&self) -> DeployResult<DeployState> {
        let path = self.state_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DeployState::default());
            }
            Err(source) => return Err(DeployError::State { path, source }),
        };
        serde_json::from_str(&contents).map_err(|source| DeployError::StateParse { path, source })
    }

    /// Persist the state, creating the state directory on first use.
    pub fn save(&self, state: &DeployState) -> DeployResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|source| DeployError::State {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.state_path();
        let contents =
            serde_json::to_string_pretty(state).expect("deploy state serializes to json");
        std::fs::write(&path, contents).map_err(|source| DeployError::State { path, source })
    }

    /// Acquire the single-deploy lock for this target.
    pub fn lock(&self) -> DeployResult<DeployLock> {
        DeployLock::acquire(&self.dir)
    }
}

/// Held for the duration of one deploy; released (file removed) on drop.
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
}

impl DeployLock {
    fn acquire(dir: &Path) -> DeployResult<Self> {
        std::fs::create_dir_all(dir).map_err(|source| DeployError::Lock {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                tracing::debug!(lock = %path.display(), "deploy lock acquired");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(DeployError::LockHeld { path })
            }
            Err(source) => Err(DeployError::Lock { path, source }),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                lock = %self.path.display(),
                error = %e,
                "failed to release deploy lock; remove it manually before the next deploy"
            );
        }
    }
}
