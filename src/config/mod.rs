//! Configuration module for the scribe gateway
//!
//! This module handles configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//! The configuration is split into logical submodules for maintainability.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `model`: Model-size and architecture selector types
//!
//! # Example
//! ```rust,no_run
//! use scribe_gateway::config::GatewayConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = GatewayConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = GatewayConfig::from_file(&config_path)?;
//!
//! println!("Gateway listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

mod env;
mod merge;
pub mod model;
mod validation;
mod yaml;

pub use model::{Architecture, ModelSize};

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal: they surface to the operator before any build, deploy,
/// or serve action starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    YamlParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid environment variable {name}: {message}")]
    InvalidEnvVar { name: String, message: String },

    #[error("invalid model size '{value}' (allowed: {allowed})")]
    InvalidModelSize { value: String, allowed: String },

    #[error("invalid architecture '{0}' (allowed: x86_64, arm64)")]
    InvalidArchitecture(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// A configured API key with its usage-plan binding.
///
/// The secret is the only sensitive artifact this system produces; it is zeroized
/// when the configuration is dropped and never appears in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyEntry {
    pub id: String,
    pub secret: String,
    pub enabled: bool,
    /// Usage plan this key is bound to. Admission requires the binding to match
    /// the deployment's active plan; possession of *a* key is not enough.
    pub plan: String,
}

impl std::fmt::Debug for ApiKeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyEntry")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("plan", &self.plan)
            .finish()
    }
}

/// Usage plan policy: period quota plus token-bucket throttle.
///
/// Quota and throttle are enforced independently; see
/// [`UsagePlan`](crate::admission::UsagePlan).
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Requests admitted per quota period.
    pub quota_limit: u64,
    /// Quota period length in seconds. Default is 30 days.
    pub quota_period_secs: u64,
    /// Steady-state throttle rate, requests per second.
    pub throttle_rate: u32,
    /// Burst capacity above the steady-state rate.
    pub throttle_burst: u32,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            quota_limit: 1000,
            quota_period_secs: 30 * 24 * 3600,
            throttle_rate: 5,
            throttle_burst: 10,
        }
    }
}

impl PlanConfig {
    pub fn quota_period(&self) -> Duration {
        Duration::from_secs(self.quota_period_secs)
    }
}

/// Compute function binding parameters.
#[derive(Debug, Clone)]
pub struct FunctionConfig {
    /// Invocation endpoint the gateway proxies requests to.
    pub url: String,
    /// Hard wall-clock ceiling per invocation. Exceeding it aborts the request.
    pub timeout_secs: u64,
    /// Memory ceiling declared on the function binding, in MiB.
    pub memory_mb: u32,
    /// CPU architecture the image is built for and the function runs on.
    pub architecture: Architecture,
    /// Model tier loaded by the transcription handler.
    pub model_size: ModelSize,
    /// Cache-directory override exported to the handler environment.
    pub cache_dir: PathBuf,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000/2015-03-31/functions/function/invocations".to_string(),
            timeout_secs: 120,
            memory_mb: 2048,
            architecture: Architecture::default(),
            model_size: ModelSize::default(),
            cache_dir: PathBuf::from("/mnt/cache"),
        }
    }
}

impl FunctionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Deploy pipeline parameters: image identity, watched inputs, and state location.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Region the registry and function live in.
    pub region: String,
    /// Registry host the image is pushed to, e.g. `localhost:5000`.
    pub registry_url: String,
    /// Repository name within the registry.
    pub repository: String,
    /// Version tag for the next publish. `latest` is reserved for the publish step.
    pub image_version: String,
    /// Watched input: container build recipe.
    pub recipe_path: PathBuf,
    /// Watched input: handler entry point.
    pub handler_path: PathBuf,
    /// Watched input: dependency manifest.
    pub manifest_path: PathBuf,
    /// Directory holding the deploy state file and lock.
    pub state_dir: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            registry_url: "localhost:5000".to_string(),
            repository: "scribe-transcriber".to_string(),
            image_version: "1.0.0".to_string(),
            recipe_path: PathBuf::from("Dockerfile"),
            handler_path: PathBuf::from("app.py"),
            manifest_path: PathBuf::from("requirements.txt"),
            state_dir: PathBuf::from(".scribe-deploy"),
        }
    }
}

/// Top-level configuration for both the serve and deploy commands.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    // Admission gateway
    /// When false, the HTTP front door does not exist: `serve` exposes only the
    /// health route and the function must be invoked by another mechanism.
    pub gateway_enabled: bool,
    /// CORS allowed origins (comma-separated list or "*" for all).
    /// Default: None (CORS disabled, same-origin only).
    pub cors_allowed_origins: Option<String>,
    /// Name of the usage plan bound to this deployment's live stage.
    pub active_plan: String,
    /// Configured API keys with their plan bindings.
    pub api_keys: Vec<ApiKeyEntry>,
    /// Quota/throttle policy for the active plan.
    pub plan: PlanConfig,

    // Compute function binding
    pub function: FunctionConfig,

    // Deploy pipeline
    pub deploy: DeployConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            tls: None,
            gateway_enabled: true,
            cors_allowed_origins: None,
            active_plan: "default".to_string(),
            api_keys: Vec::new(),
            plan: PlanConfig::default(),
            function: FunctionConfig::default(),
            deploy: DeployConfig::default(),
        }
    }
}

/// Zeroize key secrets when the configuration is dropped so sensitive data is
/// cleared from memory immediately after use.
impl Drop for GatewayConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        for entry in &mut self.api_keys {
            entry.secret.zeroize();
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables (with defaults) and validate.
    ///
    /// `.env` values participate only if they were loaded into the process
    /// environment beforehand (done in `main.rs` at startup).
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    /// Run every validation pass over the assembled configuration.
    ///
    /// This is the gate the error taxonomy calls "configuration errors": nothing
    /// downstream (build, publish, serve) starts if any check fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_plan(self)?;
        validation::validate_api_keys(self)?;
        validation::validate_function(self)?;
        validation::validate_deploy(self)?;
        Ok(())
    }

    /// Get the server bind address as a string in "host:port" form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled.
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// API keys bound to the active plan, as admission-layer keys.
    pub fn keys_for_active_plan(&self) -> impl Iterator<Item = &ApiKeyEntry> {
        self.api_keys.iter().filter(|k| k.plan == self.active_plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_formats_host_and_port() {
        let mut config = GatewayConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = 9999;
        assert_eq!(config.address(), "127.0.0.1:9999");
    }

    #[test]
    fn debug_redacts_key_secret() {
        let entry = ApiKeyEntry {
            id: "client-a".into(),
            secret: "very-secret-value".into(),
            enabled: true,
            plan: "default".into(),
        };
        let rendered = format!("{entry:?}");
        assert!(!rendered.contains("very-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn keys_for_active_plan_filters_bindings() {
        let mut config = GatewayConfig::default();
        config.active_plan = "prod".to_string();
        config.api_keys = vec![
            ApiKeyEntry {
                id: "bound".into(),
                secret: "s1".into(),
                enabled: true,
                plan: "prod".into(),
            },
            ApiKeyEntry {
                id: "stale".into(),
                secret: "s2".into(),
                enabled: true,
                plan: "old-stage".into(),
            },
        ];
        let bound: Vec<_> = config.keys_for_active_plan().map(|k| k.id.as_str()).collect();
        assert_eq!(bound, vec!["bound"]);
    }
}
