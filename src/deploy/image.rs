//! Image identity and the build/publish seams
//!
//! The container build itself is an external collaborator: a toolchain that bakes
//! the decoding library and the speech model into an image. This module owns only
//! its identity (registry/repository/tag), the traits the pipeline drives it
//! through, and a container-CLI implementation of those traits.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{Architecture, DeployConfig, ModelSize};

use super::error::{DeployError, DeployResult};

/// Tag the compute function binds to. Always repointed by a successful publish.
pub const LATEST_TAG: &str = "latest";

/// Fully-qualified image reference: `registry/repository:tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// The version-tag reference for this deploy.
    pub fn version_from_config(config: &DeployConfig) -> Self {
        Self::new(&config.registry_url, &config.repository, &config.image_version)
    }

    /// The `latest` reference the function binding consumes.
    pub fn latest_from_config(config: &DeployConfig) -> Self {
        Self::new(&config.registry_url, &config.repository, LATEST_TAG)
    }

    /// Same repository, different tag.
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self::new(&self.registry, &self.repository, tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// Content identity of a built image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDigest(pub String);

impl fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inputs handed to the opaque build step.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    /// Build context directory.
    pub context: PathBuf,
    /// Build recipe path (also a fingerprint-watched input).
    pub recipe: PathBuf,
    /// Pinned target platform, e.g. `linux/amd64`.
    pub platform: String,
    /// Tag applied to the build output.
    pub image: ImageReference,
    /// Model tier baked into the image at build time.
    pub model_size: ModelSize,
}

impl BuildSpec {
    pub fn from_config(config: &DeployConfig, architecture: Architecture, model_size: ModelSize) -> Self {
        let context = config
            .recipe_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            context,
            recipe: config.recipe_path.clone(),
            platform: architecture.platform().to_string(),
            image: ImageReference::version_from_config(config),
            model_size,
        }
    }
}

/// The opaque, platform-pinned container build step.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, spec: &BuildSpec) -> DeployResult<ImageDigest>;
}

/// The registry the pipeline publishes to and the function host pulls from.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Push `digest` under the reference's tag. Returns the digest the tag held
    /// before, if any, so the caller can notice an overwrite.
    async fn push(&self, image: &ImageReference, digest: &ImageDigest)
        -> DeployResult<Option<ImageDigest>>;

    /// Digest currently held by the reference's tag, if the tag exists.
    async fn resolve(&self, image: &ImageReference) -> DeployResult<Option<ImageDigest>>;
}

/// Container-CLI implementation of both seams.
///
/// Drives the local container toolchain (`docker` or a drop-in like `podman`)
/// through its CLI. Authentication against the registry is the operator's
/// concern (`docker login` or a credential helper), exactly as it is for any
/// other push from the deploy host.
#[derive(Debug, Clone)]
pub struct ContainerCli {
    program: String,
}

impl ContainerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Pull an image reference from the registry.
    pub(super) async fn pull(&self, image: &str) -> Result<(), String> {
        self.run(&["pull", image]).await.map(|_| ())
    }

    /// Stop and recreate a serving container against a new image.
    pub(super) async fn replace_container(
        &self,
        name: &str,
        spec: &super::function::FunctionSpec,
    ) -> Result<(), String> {
        // `rm -f` on a container that does not exist yet is fine; first deploy
        // simply has nothing to remove.
        let _ = self.run(&["rm", "-f", name]).await;

        let image = spec.image.to_string();
        let memory = format!("{}m", spec.memory_mb);
        let stop_timeout = spec.timeout_secs.to_string();
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            name.into(),
            "--platform".into(),
            spec.architecture.platform().into(),
            "--memory".into(),
            memory,
            "--stop-timeout".into(),
            stop_timeout,
        ];
        for (key, value) in spec.env.as_env_vars() {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args.push(image);

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs).await.map(|_| ())
    }

    async fn run(&self, args: &[&str]) -> Result<String, String> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| format!("failed to spawn {}: {e}", self.program))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).into_owned())
        }
    }
}

impl Default for ContainerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ImageBuilder for ContainerCli {
    async fn build(&self, spec: &BuildSpec) -> DeployResult<ImageDigest> {
        let image = spec.image.to_string();
        let model_arg = format!("MODEL_SIZE={}", spec.model_size);
        tracing::info!(
            image = %image,
            platform = %spec.platform,
            model_size = %spec.model_size,
            "building container image"
        );

        self.run(&[
            "build",
            "--platform",
            &spec.platform,
            "--build-arg",
            &model_arg,
            "-f",
            &spec.recipe.to_string_lossy(),
            "-t",
            &image,
            &spec.context.to_string_lossy(),
        ])
        .await
        .map_err(DeployError::build)?;

        // The image ID is the content identity of what was just built.
        let id = self
            .run(&["image", "inspect", "--format", "{{.Id}}", &image])
            .await
            .map_err(DeployError::build)?;
        Ok(ImageDigest(id.trim().to_string()))
    }
}

#[async_trait]
impl ImageRegistry for ContainerCli {
    async fn push(
        &self,
        image: &ImageReference,
        _digest: &ImageDigest,
    ) -> DeployResult<Option<ImageDigest>> {
        let prior = self.resolve(image).await?;
        let reference = image.to_string();

        tracing::info!(image = %reference, "pushing image tag");
        self.run(&["push", &reference])
            .await
            .map_err(|message| DeployError::push(&reference, message))?;

        Ok(prior)
    }

    async fn resolve(&self, image: &ImageReference) -> DeployResult<Option<ImageDigest>> {
        let reference = image.to_string();
        match self.run(&["manifest", "inspect", &reference]).await {
            Ok(manifest) => Ok(extract_digest(&manifest).map(ImageDigest)),
            // An absent tag is not an error; the registry just has nothing there yet.
            Err(_) => Ok(None),
        }
    }
}

/// Pull the first `sha256:...` digest out of a manifest document.
fn extract_digest(manifest: &str) -> Option<String> {
    let start = manifest.find("sha256:")?;
    let digest: String = manifest[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == ':')
        .collect();
    (digest.len() > "sha256:".len()).then_some(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_renders_fully_qualified() {
        let image = ImageReference::new("registry.local:5000", "scribe-transcriber", "1.2.0");
        assert_eq!(image.to_string(), "registry.local:5000/scribe-transcriber:1.2.0");
        assert_eq!(image.with_tag(LATEST_TAG).tag, "latest");
    }

    #[test]
    fn extract_digest_finds_manifest_digest() {
        let manifest = r#"{"config": {"digest": "sha256:ab12cd34", "size": 7023}}"#;
        assert_eq!(extract_digest(manifest).unwrap(), "sha256:ab12cd34");
        assert_eq!(extract_digest("no digest here"), None);
        assert_eq!(extract_digest("sha256:"), None);
    }
}
