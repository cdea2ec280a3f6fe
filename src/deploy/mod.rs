//! Deploy-time pipeline
//!
//! Decides when the container image backing the compute function must be rebuilt
//! and republished, and carries the result through to the function binding and
//! the gateway stage record. The ordering constraints are an explicit DAG:
//!
//! ```text
//! fingerprint ──▶ build-publish ──▶ function-update ──▶ stage-record
//! ```
//!
//! Everything here is offline/deploy-time; none of it is on the request path.
//! The pipeline is a blocking, serialized operation per deployment target: a
//! lock file guards against concurrent deploys, and the fingerprint baseline is
//! committed only after a publish fully succeeds.

pub mod error;
pub mod fingerprint;
pub mod function;
pub mod graph;
pub mod image;
pub mod state;
pub mod tasks;

pub use error::{DeployError, DeployResult};
pub use fingerprint::{BuildFingerprint, WatchSet, WatchedInput};
pub use function::{ContainerFunctionHost, FunctionHost, FunctionSpec};
pub use graph::{DeployContext, DeployGraph, DeployTask, TaskOutcome, TaskReport};
pub use image::{ContainerCli, ImageBuilder, ImageDigest, ImageReference, ImageRegistry, LATEST_TAG};
pub use state::{DeployState, DeployStateStore};

use std::sync::Arc;

use crate::config::GatewayConfig;

use tasks::{
    BuildPublishTask, FingerprintTask, FunctionUpdateTask, StageRecordTask, BUILD_PUBLISH_TASK,
    FINGERPRINT_TASK, FUNCTION_UPDATE_TASK, STAGE_RECORD_TASK,
};

/// Compile the canonical pipeline with its stated edges.
pub fn standard_pipeline(
    builder: Arc<dyn ImageBuilder>,
    registry: Arc<dyn ImageRegistry>,
    host: Arc<dyn FunctionHost>,
) -> DeployResult<DeployGraph> {
    DeployGraph::compile(
        vec![
            Arc::new(FingerprintTask),
            Arc::new(BuildPublishTask::new(builder, registry)),
            Arc::new(FunctionUpdateTask::new(host)),
            Arc::new(StageRecordTask),
        ],
        &[
            (FINGERPRINT_TASK, BUILD_PUBLISH_TASK),
            (BUILD_PUBLISH_TASK, FUNCTION_UPDATE_TASK),
            (FUNCTION_UPDATE_TASK, STAGE_RECORD_TASK),
        ],
    )
}

/// Run one deploy of the configured target.
///
/// Acquires the single-deploy lock, loads the recorded baseline, executes the
/// pipeline, and returns the per-task report. Any error propagates to the caller
/// with the previous deployment left live.
pub async fn run_deploy(
    config: GatewayConfig,
    builder: Arc<dyn ImageBuilder>,
    registry: Arc<dyn ImageRegistry>,
    host: Arc<dyn FunctionHost>,
) -> DeployResult<Vec<TaskReport>> {
    let store = DeployStateStore::new(&config.deploy.state_dir);
    let _lock = store.lock()?;
    let state = store.load()?;

    let pipeline = standard_pipeline(builder, registry, host)?;
    let mut ctx = DeployContext::new(config, store, state);
    pipeline.execute(&mut ctx).await
}
