//! Concrete deploy pipeline tasks
//!
//! Four tasks wired as fingerprint → build-publish → function-update →
//! stage-record. Skips flow through the shared context: an unchanged fingerprint
//! turns the publish into a no-op, which in turn makes the function update one.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::error::DeployResult;
use super::fingerprint::{BuildFingerprint, WatchSet};
use super::function::{FunctionHost, FunctionSpec};
use super::graph::{DeployContext, DeployTask, PublishOutcome, TaskOutcome};
use super::image::{BuildSpec, ImageBuilder, ImageReference, ImageRegistry};

pub const FINGERPRINT_TASK: &str = "fingerprint";
pub const BUILD_PUBLISH_TASK: &str = "build-publish";
pub const FUNCTION_UPDATE_TASK: &str = "function-update";
pub const STAGE_RECORD_TASK: &str = "stage-record";

/// Computes the content fingerprint and compares it against the baseline.
pub struct FingerprintTask;

#[async_trait]
impl DeployTask for FingerprintTask {
    fn id(&self) -> &str {
        FINGERPRINT_TASK
    }

    async fn run(&self, ctx: &mut DeployContext) -> DeployResult<TaskOutcome> {
        let watch_set = WatchSet::from_config(&ctx.config.deploy);
        let fingerprint = BuildFingerprint::compute(&watch_set)?;

        let changed = ctx.state.baseline_fingerprint.as_deref() != Some(fingerprint.combined());
        info!(
            fingerprint = %fingerprint,
            changed = %changed,
            "watched inputs fingerprinted"
        );

        ctx.fingerprint_changed = changed;
        ctx.fingerprint = Some(fingerprint);
        Ok(TaskOutcome::Completed)
    }
}

/// Builds and publishes the image when (and only when) the fingerprint changed.
///
/// Atomicity is at the granularity of the whole step: the fingerprint baseline is
/// recorded only after both tags pushed, so any failure leaves the previous
/// `latest` as the deployed reference and the next deploy retries everything.
pub struct BuildPublishTask {
    builder: Arc<dyn ImageBuilder>,
    registry: Arc<dyn ImageRegistry>,
}

impl BuildPublishTask {
    pub fn new(builder: Arc<dyn ImageBuilder>, registry: Arc<dyn ImageRegistry>) -> Self {
        Self { builder, registry }
    }
}

#[async_trait]
impl DeployTask for BuildPublishTask {
    fn id(&self) -> &str {
        BUILD_PUBLISH_TASK
    }

    async fn run(&self, ctx: &mut DeployContext) -> DeployResult<TaskOutcome> {
        if !ctx.fingerprint_changed {
            return Ok(TaskOutcome::Skipped {
                reason: "fingerprint unchanged since last publish".to_string(),
            });
        }
        let fingerprint = ctx
            .fingerprint
            .clone()
            .expect("fingerprint task runs before publish");

        let spec = BuildSpec::from_config(
            &ctx.config.deploy,
            ctx.config.function.architecture,
            ctx.config.function.model_size,
        );
        let version = spec.image.clone();
        let latest = ImageReference::latest_from_config(&ctx.config.deploy);

        let digest = self.builder.build(&spec).await?;

        // Re-publishing an existing version tag with different content is allowed
        // (a failed deploy must be retryable under the same version), but it is
        // loud: the tag's history is being overwritten.
        if let Some(prior) = self.registry.resolve(&version).await? {
            if prior != digest {
                warn!(
                    image = %version,
                    prior_digest = %prior,
                    new_digest = %digest,
                    "version tag already exists with different content; overwriting"
                );
            }
        }

        self.registry.push(&version, &digest).await?;
        self.registry.push(&latest, &digest).await?;

        ctx.state.baseline_fingerprint = Some(fingerprint.combined().to_string());
        ctx.state.last_published_version = Some(version.tag.clone());
        ctx.store.save(&ctx.state)?;

        info!(version = %version, latest = %latest, digest = %digest, "image published");
        ctx.published = Some(PublishOutcome {
            version,
            latest,
            digest,
        });
        Ok(TaskOutcome::Completed)
    }
}

/// Repoints the function binding at `latest` after a publish.
pub struct FunctionUpdateTask {
    host: Arc<dyn FunctionHost>,
}

impl FunctionUpdateTask {
    pub fn new(host: Arc<dyn FunctionHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl DeployTask for FunctionUpdateTask {
    fn id(&self) -> &str {
        FUNCTION_UPDATE_TASK
    }

    async fn run(&self, ctx: &mut DeployContext) -> DeployResult<TaskOutcome> {
        if ctx.published.is_none() {
            return Ok(TaskOutcome::Skipped {
                reason: "no new image published".to_string(),
            });
        }

        let spec = FunctionSpec::from_config(&ctx.config);
        self.host.update_image(&spec).await?;
        Ok(TaskOutcome::Completed)
    }
}

/// Records the gateway stage (active plan) as live in the deploy state.
pub struct StageRecordTask;

#[async_trait]
impl DeployTask for StageRecordTask {
    fn id(&self) -> &str {
        STAGE_RECORD_TASK
    }

    async fn run(&self, ctx: &mut DeployContext) -> DeployResult<TaskOutcome> {
        if !ctx.config.gateway_enabled {
            return Ok(TaskOutcome::Skipped {
                reason: "gateway disabled; no stage to record".to_string(),
            });
        }

        ctx.state.staged_plan = Some(ctx.config.active_plan.clone());
        ctx.store.save(&ctx.state)?;
        info!(plan = %ctx.config.active_plan, "gateway stage recorded");
        Ok(TaskOutcome::Completed)
    }
}
