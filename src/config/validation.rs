//! Configuration validation
//!
//! Every check here runs before any build, deploy, or serve action begins.
//! Validation failures are fatal and non-retryable: the operator fixes the
//! configuration and runs the command again.

use super::{ConfigError, GatewayConfig};

/// Usage-plan values must describe an enforceable policy.
pub(super) fn validate_plan(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.plan.throttle_rate == 0 {
        return Err(ConfigError::Invalid(
            "plan.throttle_rate must be at least 1 request/second".to_string(),
        ));
    }
    if config.plan.throttle_burst == 0 {
        return Err(ConfigError::Invalid(
            "plan.throttle_burst must be at least 1".to_string(),
        ));
    }
    if config.plan.quota_limit == 0 {
        return Err(ConfigError::Invalid(
            "plan.quota_limit must be at least 1 request/period".to_string(),
        ));
    }
    if config.plan.quota_period_secs == 0 {
        return Err(ConfigError::Invalid(
            "plan.quota_period_secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// API key entries must be unique by id and secret.
///
/// Duplicate secrets would make the constant-time lookup ambiguous; duplicate ids
/// would make log attribution ambiguous.
pub(super) fn validate_api_keys(config: &GatewayConfig) -> Result<(), ConfigError> {
    for (i, entry) in config.api_keys.iter().enumerate() {
        for other in &config.api_keys[i + 1..] {
            if entry.id == other.id {
                return Err(ConfigError::Invalid(format!(
                    "duplicate api key id '{}'",
                    entry.id
                )));
            }
            if entry.secret == other.secret {
                return Err(ConfigError::Invalid(format!(
                    "api keys '{}' and '{}' share a secret",
                    entry.id, other.id
                )));
            }
        }
    }
    Ok(())
}

/// The function binding must have a usable invocation target and ceilings.
pub(super) fn validate_function(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.function.timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "function.timeout_secs must be at least 1".to_string(),
        ));
    }
    if config.function.memory_mb < 128 {
        return Err(ConfigError::Invalid(format!(
            "function.memory_mb {} is below the 128 MB floor",
            config.function.memory_mb
        )));
    }
    if config.gateway_enabled {
        let url = &config.function.url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "function.url '{url}' must be an http(s) endpoint"
            )));
        }
    }
    Ok(())
}

/// The deploy pipeline needs a non-empty image identity.
///
/// Watched-input paths are deliberately NOT checked for existence here: the
/// fingerprint step fails fast on unreadable inputs at deploy time, and `serve`
/// must be able to run on hosts that never see the build context.
pub(super) fn validate_deploy(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.deploy.registry_url.is_empty() {
        return Err(ConfigError::Invalid(
            "deploy.registry_url must not be empty".to_string(),
        ));
    }
    if config.deploy.repository.is_empty() {
        return Err(ConfigError::Invalid(
            "deploy.repository must not be empty".to_string(),
        ));
    }
    if config.deploy.image_version.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "deploy.image_version must not be empty".to_string(),
        ));
    }
    if config.deploy.image_version == "latest" {
        return Err(ConfigError::Invalid(
            "deploy.image_version must not be 'latest'; the latest tag is managed by the publish step"
                .to_string(),
        ));
    }
    Ok(())
}
