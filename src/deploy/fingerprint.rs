//! Content fingerprinting of build-relevant inputs
//!
//! A rebuild is expensive (minutes, network transfer), so the pipeline rebuilds
//! only when a watched input actually changed. Content hashes, not timestamps:
//! timestamps are unreliable across checkouts and filesystems and say nothing
//! about content equality.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::DeployConfig;

use super::error::{DeployError, DeployResult};

/// One named input the fingerprint watches.
#[derive(Debug, Clone)]
pub struct WatchedInput {
    pub name: String,
    pub path: PathBuf,
}

impl WatchedInput {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// The set of inputs whose bytes decide whether the image must be rebuilt.
#[derive(Debug, Clone)]
pub struct WatchSet {
    inputs: Vec<WatchedInput>,
}

impl WatchSet {
    pub fn new(inputs: Vec<WatchedInput>) -> Self {
        Self { inputs }
    }

    /// The canonical watch set: build recipe, handler entry point, dependency manifest.
    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(vec![
            WatchedInput::new("recipe", &config.recipe_path),
            WatchedInput::new("handler", &config.handler_path),
            WatchedInput::new("manifest", &config.manifest_path),
        ])
    }

    pub fn inputs(&self) -> &[WatchedInput] {
        &self.inputs
    }
}

/// Digest of a single watched artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDigest {
    pub name: String,
    pub sha256: String,
}

/// Deterministic digest over the whole watch set.
///
/// Pure function of the input bytes: identical inputs always yield the identical
/// fingerprint, and any byte-level change to any watched input changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFingerprint {
    artifacts: Vec<ArtifactDigest>,
    combined: String,
}

impl BuildFingerprint {
    /// Compute the fingerprint, failing fast if any input is unreadable.
    ///
    /// Proceeding with a default or stale digest would make the rebuild decision
    /// unsound, so a missing file is an error, never a skip.
    pub fn compute(watch_set: &WatchSet) -> DeployResult<Self> {
        let mut artifacts = Vec::with_capacity(watch_set.inputs().len());
        let mut combined = Sha256::new();

        for input in watch_set.inputs() {
            let bytes = read_input(&input.path)?;

            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let digest = hex::encode(hasher.finalize());

            // Frame each artifact as (name, NUL, length, bytes) inside the combined
            // hash so content cannot alias across artifact boundaries.
            combined.update(input.name.as_bytes());
            combined.update([0u8]);
            combined.update((bytes.len() as u64).to_le_bytes());
            combined.update(&bytes);

            artifacts.push(ArtifactDigest {
                name: input.name.clone(),
                sha256: digest,
            });
        }

        Ok(Self {
            artifacts,
            combined: hex::encode(combined.finalize()),
        })
    }

    /// The combined digest in hex; this is the value compared against the baseline.
    pub fn combined(&self) -> &str {
        &self.combined
    }

    /// Per-artifact digests, in watch-set order.
    pub fn artifacts(&self) -> &[ArtifactDigest] {
        &self.artifacts
    }
}

impl fmt::Display for BuildFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs; the full digest is available via combined().
        f.write_str(&self.combined[..12.min(self.combined.len())])
    }
}

fn read_input(path: &Path) -> DeployResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| DeployError::WatchedInput {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_inputs(dir: &TempDir, recipe: &[u8], handler: &[u8], manifest: &[u8]) -> WatchSet {
        let recipe_path = dir.path().join("Dockerfile");
        let handler_path = dir.path().join("app.py");
        let manifest_path = dir.path().join("requirements.txt");
        fs::write(&recipe_path, recipe).unwrap();
        fs::write(&handler_path, handler).unwrap();
        fs::write(&manifest_path, manifest).unwrap();
        WatchSet::new(vec![
            WatchedInput::new("recipe", recipe_path),
            WatchedInput::new("handler", handler_path),
            WatchedInput::new("manifest", manifest_path),
        ])
    }

    #[test]
    fn identical_inputs_yield_identical_fingerprints() {
        let dir = TempDir::new().unwrap();
        let watch = write_inputs(&dir, b"FROM base", b"def handler(): pass", b"whisper==1.0");

        let first = BuildFingerprint::compute(&watch).unwrap();
        let second = BuildFingerprint::compute(&watch).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.combined(), second.combined());
    }

    #[test]
    fn single_byte_change_in_any_input_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        let watch = write_inputs(&dir, b"FROM base", b"def handler(): pass", b"whisper==1.0");
        let baseline = BuildFingerprint::compute(&watch).unwrap();

        for (file, contents) in [
            ("Dockerfile", &b"FROM basf"[..]),
            ("app.py", &b"def handler(): sass"[..]),
            ("requirements.txt", &b"whisper==1.1"[..]),
        ] {
            let dir2 = TempDir::new().unwrap();
            let watch2 = write_inputs(&dir2, b"FROM base", b"def handler(): pass", b"whisper==1.0");
            fs::write(dir2.path().join(file), contents).unwrap();
            let changed = BuildFingerprint::compute(&watch2).unwrap();
            assert_ne!(baseline.combined(), changed.combined(), "change to {file} not detected");
        }
    }

    #[test]
    fn artifact_boundaries_cannot_alias() {
        // "ab" + "c" and "a" + "bc" concatenate identically; the framing keeps
        // their combined digests apart.
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");

        fs::write(&a, b"ab").unwrap();
        fs::write(&b, b"c").unwrap();
        let first = BuildFingerprint::compute(&WatchSet::new(vec![
            WatchedInput::new("x", &a),
            WatchedInput::new("y", &b),
        ]))
        .unwrap();

        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"bc").unwrap();
        let second = BuildFingerprint::compute(&WatchSet::new(vec![
            WatchedInput::new("x", &a),
            WatchedInput::new("y", &b),
        ]))
        .unwrap();

        assert_ne!(first.combined(), second.combined());
    }

    #[test]
    fn missing_input_fails_fast() {
        let dir = TempDir::new().unwrap();
        let watch = WatchSet::new(vec![WatchedInput::new(
            "recipe",
            dir.path().join("does-not-exist"),
        )]);
        let err = BuildFingerprint::compute(&watch).unwrap_err();
        assert!(matches!(err, DeployError::WatchedInput { .. }));
    }
}
