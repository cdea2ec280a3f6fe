//! Deploy pipeline error types
//!
//! Centralized error handling for the deploy pipeline with detailed variants for
//! configuration, fingerprinting, build/publish, and graph failures.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for deploy operations
pub type DeployResult<T> = Result<T, DeployError>;

/// Comprehensive error type for the deploy pipeline
#[derive(Debug, Error)]
pub enum DeployError {
    // ─────────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────────

    /// Configuration failed validation before the pipeline started
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    // ─────────────────────────────────────────────────────────────────────────────
    // Fingerprint Errors
    // ─────────────────────────────────────────────────────────────────────────────

    /// A watched input could not be read; the rebuild decision would be unsound
    #[error("watched input '{path}' is unreadable: {source}")]
    WatchedInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────────
    // State / Locking Errors
    // ─────────────────────────────────────────────────────────────────────────────

    /// Deploy state file could not be read or written
    #[error("deploy state at '{path}' is inaccessible: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Deploy state file is corrupt
    #[error("deploy state at '{path}' failed to parse: {source}")]
    StateParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Another deploy of the same target holds the lock
    #[error("deploy lock at '{path}' is held by another deploy; concurrent deploys of one target are not allowed")]
    LockHeld { path: PathBuf },

    /// The lock file could not be created or removed
    #[error("deploy lock at '{path}' failed: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────────
    // Build / Publish Errors
    // ─────────────────────────────────────────────────────────────────────────────

    /// The container build failed
    #[error("image build failed: {message}")]
    Build { message: String },

    /// Pushing a tag to the registry failed
    #[error("push of '{image}' failed: {message}")]
    Push { image: String, message: String },

    /// A registry query failed
    #[error("registry operation failed: {message}")]
    Registry { message: String },

    /// Updating the function binding to the new image failed
    #[error("function update failed: {message}")]
    FunctionUpdate { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────────

    /// Duplicate task ID in the pipeline definition
    #[error("duplicate deploy task id: {0}")]
    DuplicateTask(String),

    /// An edge references a task that was never added
    #[error("unknown deploy task id: {0}")]
    UnknownTask(String),

    /// Cycle detected in the pipeline (violates acyclicity)
    #[error("cycle detected in deploy pipeline at task: {0}")]
    CycleDetected(String),
}

impl DeployError {
    /// Create a build error
    pub fn build(message: impl std::fmt::Display) -> Self {
        Self::Build {
            message: message.to_string(),
        }
    }

    /// Create a push error
    pub fn push(image: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Self::Push {
            image: image.to_string(),
            message: message.to_string(),
        }
    }

    /// Check if this error is a configuration error (caught before any action)
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DuplicateTask(_) | Self::UnknownTask(_) | Self::CycleDetected(_)
        )
    }

    /// Check if this error left the previous deployment live (no partial commit)
    pub fn is_publish_error(&self) -> bool {
        matches!(
            self,
            Self::Build { .. } | Self::Push { .. } | Self::Registry { .. }
        )
    }
}
