//! Compute function binding
//!
//! The function executes "whatever image is currently tagged `latest`" plus three
//! scalar parameters and a small fixed environment. The binding never pins a
//! version tag: every successful publish implicitly updates the live function on
//! the next update call, which is why the pipeline orders publish strictly before
//! function update.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::{Architecture, GatewayConfig, ModelSize};

use super::error::{DeployError, DeployResult};
use super::image::ImageReference;

/// Environment exported to the transcription handler.
///
/// Names match the handler's contract: the model loader honors `XDG_CACHE_HOME`
/// for its cache directory and `MODEL_SIZE` for the tier to load.
#[derive(Debug, Clone)]
pub struct FunctionEnv {
    pub cache_dir: PathBuf,
    pub model_size: ModelSize,
}

impl FunctionEnv {
    pub fn as_env_vars(&self) -> Vec<(String, String)> {
        vec![
            (
                "XDG_CACHE_HOME".to_string(),
                self.cache_dir.to_string_lossy().into_owned(),
            ),
            ("MODEL_SIZE".to_string(), self.model_size.to_string()),
        ]
    }
}

/// Declared shape of the serverless function.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    /// The image the function runs; always the `latest` reference.
    pub image: ImageReference,
    /// Hard wall-clock ceiling per invocation, seconds.
    pub timeout_secs: u64,
    /// Memory ceiling, MiB.
    pub memory_mb: u32,
    /// Must match the platform the image was built for.
    pub architecture: Architecture,
    pub env: FunctionEnv,
}

impl FunctionSpec {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            image: ImageReference::latest_from_config(&config.deploy),
            timeout_secs: config.function.timeout_secs,
            memory_mb: config.function.memory_mb,
            architecture: config.function.architecture,
            env: FunctionEnv {
                cache_dir: config.function.cache_dir.clone(),
                model_size: config.function.model_size,
            },
        }
    }
}

/// The hosting layer that runs the function.
///
/// `update_image` repoints the running function at the current `latest`; the
/// pipeline calls it only after publish fully succeeded.
#[async_trait]
pub trait FunctionHost: Send + Sync {
    async fn update_image(&self, spec: &FunctionSpec) -> DeployResult<()>;
}

/// Container-CLI host: replaces the serving container with one running the
/// freshly published `latest` image.
#[derive(Debug, Clone)]
pub struct ContainerFunctionHost {
    cli: super::image::ContainerCli,
    container_name: String,
}

impl ContainerFunctionHost {
    pub fn new(cli: super::image::ContainerCli, container_name: impl Into<String>) -> Self {
        Self {
            cli,
            container_name: container_name.into(),
        }
    }
}

#[async_trait]
impl FunctionHost for ContainerFunctionHost {
    async fn update_image(&self, spec: &FunctionSpec) -> DeployResult<()> {
        let image = spec.image.to_string();
        tracing::info!(
            container = %self.container_name,
            image = %image,
            memory_mb = %spec.memory_mb,
            "updating function binding to latest image"
        );

        // Replace wholesale: the old container keeps serving until the new image
        // is pulled, then the swap is a single stop/run pair.
        self.cli
            .pull(&image)
            .await
            .map_err(|message| DeployError::FunctionUpdate { message })?;
        self.cli
            .replace_container(&self.container_name, spec)
            .await
            .map_err(|message| DeployError::FunctionUpdate { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;

    #[test]
    fn spec_binds_latest_not_version() {
        let config = GatewayConfig::default();
        let spec = FunctionSpec::from_config(&config);
        assert_eq!(spec.image.tag, "latest");
        assert_ne!(spec.image.tag, config.deploy.image_version);
    }

    #[test]
    fn env_matches_handler_contract() {
        let config = GatewayConfig::default();
        let spec = FunctionSpec::from_config(&config);
        let env = spec.env.as_env_vars();
        assert!(env.contains(&("XDG_CACHE_HOME".to_string(), "/mnt/cache".to_string())));
        assert!(env.contains(&("MODEL_SIZE".to_string(), "tiny.en".to_string())));
    }
}
