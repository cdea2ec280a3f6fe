//! Environment variable loading
//!
//! Builds a [`GatewayConfig`](super::GatewayConfig) from process environment variables,
//! falling back to documented defaults for anything unset. `.env` files are loaded
//! into the environment by `main.rs` before this runs, so precedence is:
//! actual environment > `.env` values > defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::model::{Architecture, ModelSize};
use super::{
    ApiKeyEntry, ConfigError, DeployConfig, FunctionConfig, GatewayConfig, PlanConfig, TlsConfig,
};

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                name: name.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Parse the `API_KEYS` environment variable.
///
/// Format: comma-separated `id:secret` pairs, e.g. `client-a:k1abc,client-b:k2def`.
/// Keys configured through the environment are enabled and bound to the active plan;
/// the richer per-key form (disabled keys, per-key plan) is YAML-only.
fn parse_api_keys(raw: &str, active_plan: &str) -> Result<Vec<ApiKeyEntry>, ConfigError> {
    raw.split(',')
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| {
            let (id, secret) =
                chunk
                    .trim()
                    .split_once(':')
                    .ok_or_else(|| ConfigError::InvalidEnvVar {
                        name: "API_KEYS".to_string(),
                        message: format!("entry '{chunk}' is not in id:secret form"),
                    })?;
            if id.is_empty() || secret.is_empty() {
                return Err(ConfigError::InvalidEnvVar {
                    name: "API_KEYS".to_string(),
                    message: "empty id or secret".to_string(),
                });
            }
            Ok(ApiKeyEntry {
                id: id.to_string(),
                secret: secret.to_string(),
                enabled: true,
                plan: active_plan.to_string(),
            })
        })
        .collect()
}

/// Build the configuration from environment variables with defaults.
pub(super) fn load() -> Result<GatewayConfig, ConfigError> {
    let tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err(ConfigError::InvalidEnvVar {
                name: "TLS_CERT_PATH/TLS_KEY_PATH".to_string(),
                message: "both must be set to enable TLS".to_string(),
            });
        }
    };

    let active_plan = var("ACTIVE_PLAN").unwrap_or_else(|| "default".to_string());
    let api_keys = match var("API_KEYS") {
        Some(raw) => parse_api_keys(&raw, &active_plan)?,
        None => Vec::new(),
    };

    let model_size = match var("MODEL_SIZE") {
        Some(raw) => raw.parse::<ModelSize>()?,
        None => ModelSize::default(),
    };
    let architecture = match var("FUNCTION_ARCHITECTURE") {
        Some(raw) => raw.parse::<Architecture>()?,
        None => Architecture::default(),
    };

    Ok(GatewayConfig {
        host: var("SCRIBE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: parse_var("SCRIBE_PORT")?.unwrap_or(8080),
        tls,
        gateway_enabled: parse_var("GATEWAY_ENABLED")?.unwrap_or(true),
        cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
        active_plan,
        api_keys,
        plan: PlanConfig {
            quota_limit: parse_var("QUOTA_LIMIT")?.unwrap_or(1000),
            quota_period_secs: parse_var("QUOTA_PERIOD_SECS")?.unwrap_or(30 * 24 * 3600),
            throttle_rate: parse_var("THROTTLE_RATE")?.unwrap_or(5),
            throttle_burst: parse_var("THROTTLE_BURST")?.unwrap_or(10),
        },
        function: FunctionConfig {
            url: var("FUNCTION_URL").unwrap_or_else(|| {
                "http://127.0.0.1:9000/2015-03-31/functions/function/invocations".to_string()
            }),
            timeout_secs: parse_var("FUNCTION_TIMEOUT_SECS")?.unwrap_or(120),
            memory_mb: parse_var("FUNCTION_MEMORY_MB")?.unwrap_or(2048),
            architecture,
            model_size,
            cache_dir: PathBuf::from(var("MODEL_CACHE_DIR").unwrap_or_else(|| "/mnt/cache".to_string())),
        },
        deploy: DeployConfig {
            region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            registry_url: var("REGISTRY_URL").unwrap_or_else(|| "localhost:5000".to_string()),
            repository: var("IMAGE_REPOSITORY").unwrap_or_else(|| "scribe-transcriber".to_string()),
            image_version: var("IMAGE_VERSION").unwrap_or_else(|| "1.0.0".to_string()),
            recipe_path: PathBuf::from(var("WATCH_RECIPE").unwrap_or_else(|| "Dockerfile".to_string())),
            handler_path: PathBuf::from(var("WATCH_HANDLER").unwrap_or_else(|| "app.py".to_string())),
            manifest_path: PathBuf::from(
                var("WATCH_MANIFEST").unwrap_or_else(|| "requirements.txt".to_string()),
            ),
            state_dir: PathBuf::from(var("DEPLOY_STATE_DIR").unwrap_or_else(|| ".scribe-deploy".to_string())),
        },
    })
}
