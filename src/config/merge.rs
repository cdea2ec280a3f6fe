//! Merge YAML overrides onto the environment-derived base configuration
//!
//! Mirrors the loading priority documented on [`GatewayConfig`](super::GatewayConfig):
//! YAML file values override environment variables, which override defaults.

use std::path::PathBuf;

use super::model::{Architecture, ModelSize};
use super::yaml::YamlConfig;
use super::{env, ApiKeyEntry, ConfigError, GatewayConfig, TlsConfig};

/// Build the final configuration: environment base, then YAML overrides.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<GatewayConfig, ConfigError> {
    let mut config = env::load()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match (tls.enabled, tls.cert_path, tls.key_path) {
                (Some(false), _, _) => config.tls = None,
                (_, Some(cert), Some(key)) => {
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    });
                }
                (None, None, None) => {}
                _ => {
                    return Err(ConfigError::Invalid(
                        "tls requires both cert_path and key_path".to_string(),
                    ));
                }
            }
        }
    }

    if let Some(gateway) = yaml.gateway {
        if let Some(enabled) = gateway.enabled {
            config.gateway_enabled = enabled;
        }
        if let Some(origins) = gateway.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(active_plan) = gateway.active_plan {
            config.active_plan = active_plan;
        }
        if let Some(keys) = gateway.api_keys {
            // YAML key lists replace, not extend, the environment list: the file is
            // the authoritative key registry for a deployment when present.
            let default_plan = config.active_plan.clone();
            config.api_keys = keys
                .into_iter()
                .map(|k| {
                    let id = k
                        .id
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| ConfigError::Invalid("api key entry missing id".to_string()))?;
                    let secret = k.secret.filter(|v| !v.is_empty()).ok_or_else(|| {
                        ConfigError::Invalid(format!("api key '{id}' missing secret"))
                    })?;
                    Ok(ApiKeyEntry {
                        id,
                        secret,
                        enabled: k.enabled.unwrap_or(true),
                        plan: k.plan.unwrap_or_else(|| default_plan.clone()),
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
        }
    }

    if let Some(plan) = yaml.plan {
        if let Some(limit) = plan.quota_limit {
            config.plan.quota_limit = limit;
        }
        if let Some(period) = plan.quota_period_secs {
            config.plan.quota_period_secs = period;
        }
        if let Some(rate) = plan.throttle_rate {
            config.plan.throttle_rate = rate;
        }
        if let Some(burst) = plan.throttle_burst {
            config.plan.throttle_burst = burst;
        }
    }

    if let Some(function) = yaml.function {
        if let Some(url) = function.url {
            config.function.url = url;
        }
        if let Some(timeout) = function.timeout_secs {
            config.function.timeout_secs = timeout;
        }
        if let Some(memory) = function.memory_mb {
            config.function.memory_mb = memory;
        }
        if let Some(arch) = function.architecture {
            config.function.architecture = arch.parse::<Architecture>()?;
        }
        if let Some(model) = function.model_size {
            config.function.model_size = model.parse::<ModelSize>()?;
        }
        if let Some(cache_dir) = function.cache_dir {
            config.function.cache_dir = PathBuf::from(cache_dir);
        }
    }

    if let Some(deploy) = yaml.deploy {
        if let Some(region) = deploy.region {
            config.deploy.region = region;
        }
        if let Some(registry_url) = deploy.registry_url {
            config.deploy.registry_url = registry_url;
        }
        if let Some(repository) = deploy.repository {
            config.deploy.repository = repository;
        }
        if let Some(version) = deploy.image_version {
            config.deploy.image_version = version;
        }
        if let Some(recipe) = deploy.recipe_path {
            config.deploy.recipe_path = PathBuf::from(recipe);
        }
        if let Some(handler) = deploy.handler_path {
            config.deploy.handler_path = PathBuf::from(handler);
        }
        if let Some(manifest) = deploy.manifest_path {
            config.deploy.manifest_path = PathBuf::from(manifest);
        }
        if let Some(state_dir) = deploy.state_dir {
            config.deploy.state_dir = PathBuf::from(state_dir);
        }
    }

    Ok(config)
}
