use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// This structure represents the full configuration that can be loaded from a YAML file.
/// All fields are optional to allow partial configuration; environment variables provide
/// the base values and YAML overrides them.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///
/// gateway:
///   enabled: true
///   cors_allowed_origins: "*"
///   active_plan: "default"
///   api_keys:
///     - id: "client-a"
///       secret: "generated-key-value"
///       plan: "default"
///
/// plan:
///   quota_limit: 1000
///   quota_period_secs: 2592000
///   throttle_rate: 5
///   throttle_burst: 10
///
/// function:
///   url: "http://127.0.0.1:9000/2015-03-31/functions/function/invocations"
///   timeout_secs: 120
///   memory_mb: 2048
///   architecture: "x86_64"
///   model_size: "tiny.en"
///   cache_dir: "/mnt/cache"
///
/// deploy:
///   region: "us-east-1"
///   registry_url: "localhost:5000"
///   repository: "scribe-transcriber"
///   image_version: "1.0.0"
///   recipe_path: "Dockerfile"
///   handler_path: "app.py"
///   manifest_path: "requirements.txt"
///   state_dir: ".scribe-deploy"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gateway: Option<GatewayYaml>,
    pub plan: Option<PlanYaml>,
    pub function: Option<FunctionYaml>,
    pub deploy: Option<DeployYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Gateway/admission configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GatewayYaml {
    pub enabled: Option<bool>,
    pub cors_allowed_origins: Option<String>,
    /// Name of the usage plan bound to this deployment's live stage.
    pub active_plan: Option<String>,
    pub api_keys: Option<Vec<ApiKeyYaml>>,
}

/// API key entry from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ApiKeyYaml {
    pub id: Option<String>,
    pub secret: Option<String>,
    /// Disabled keys stay configured but never admit a request.
    pub enabled: Option<bool>,
    /// Usage plan this key is bound to. A key bound to a plan other than the
    /// active one is treated the same as an unknown key.
    pub plan: Option<String>,
}

/// Usage plan (quota + throttle) configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlanYaml {
    /// Requests admitted per quota period.
    pub quota_limit: Option<u64>,
    /// Quota period length in seconds (default: 30 days).
    pub quota_period_secs: Option<u64>,
    /// Steady-state throttle rate in requests per second.
    pub throttle_rate: Option<u32>,
    /// Instantaneous burst capacity above the steady-state rate.
    pub throttle_burst: Option<u32>,
}

/// Compute function binding configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FunctionYaml {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub memory_mb: Option<u32>,
    pub architecture: Option<String>,
    pub model_size: Option<String>,
    pub cache_dir: Option<String>,
}

/// Deploy pipeline configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DeployYaml {
    pub region: Option<String>,
    pub registry_url: Option<String>,
    pub repository: Option<String>,
    pub image_version: Option<String>,
    pub recipe_path: Option<String>,
    pub handler_path: Option<String>,
    pub manifest_path: Option<String>,
    pub state_dir: Option<String>,
}

impl YamlConfig {
    /// Load and parse a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::YamlParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
