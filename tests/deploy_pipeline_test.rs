//! Deploy Pipeline Tests
//!
//! Exercises the full pipeline through `run_deploy` with doubles for the build,
//! registry, and function-host seams: rebuild triggering, skip-on-unchanged,
//! tag consistency, publish atomicity, and the single-deploy lock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use scribe_gateway::config::GatewayConfig;
use scribe_gateway::deploy::{
    self, image::BuildSpec, DeployError, DeployResult, DeployStateStore, FunctionHost,
    FunctionSpec, ImageBuilder, ImageDigest, ImageReference, ImageRegistry, TaskOutcome,
};

/// Builder double: digests are derived from the recipe contents so a changed
/// input produces a new image identity, exactly like a real content-addressed build.
struct FakeBuilder {
    builds: AtomicUsize,
}

impl FakeBuilder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            builds: AtomicUsize::new(0),
        })
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBuilder for FakeBuilder {
    async fn build(&self, spec: &BuildSpec) -> DeployResult<ImageDigest> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let recipe = std::fs::read(&spec.recipe).unwrap_or_default();
        Ok(ImageDigest(format!("sha256:{}", hex::encode(&recipe))))
    }
}

/// In-memory registry double recording what digest each tag points at.
#[derive(Default)]
struct FakeRegistry {
    tags: Mutex<HashMap<String, ImageDigest>>,
}

impl FakeRegistry {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn digest_for(&self, reference: &ImageReference) -> Option<ImageDigest> {
        self.tags.lock().get(&reference.to_string()).cloned()
    }
}

#[async_trait]
impl ImageRegistry for FakeRegistry {
    async fn push(
        &self,
        image: &ImageReference,
        digest: &ImageDigest,
    ) -> DeployResult<Option<ImageDigest>> {
        Ok(self
            .tags
            .lock()
            .insert(image.to_string(), digest.clone()))
    }

    async fn resolve(&self, image: &ImageReference) -> DeployResult<Option<ImageDigest>> {
        Ok(self.tags.lock().get(&image.to_string()).cloned())
    }
}

/// Registry double whose pushes always fail, for atomicity tests.
struct BrokenRegistry;

#[async_trait]
impl ImageRegistry for BrokenRegistry {
    async fn push(
        &self,
        image: &ImageReference,
        _digest: &ImageDigest,
    ) -> DeployResult<Option<ImageDigest>> {
        Err(DeployError::push(image, "registry rejected credentials"))
    }

    async fn resolve(&self, _image: &ImageReference) -> DeployResult<Option<ImageDigest>> {
        Ok(None)
    }
}

struct FakeHost {
    updates: AtomicUsize,
}

impl FakeHost {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            updates: AtomicUsize::new(0),
        })
    }

    fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FunctionHost for FakeHost {
    async fn update_image(&self, spec: &FunctionSpec) -> DeployResult<()> {
        assert_eq!(spec.image.tag, "latest");
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn write_build_inputs(dir: &Path) {
    std::fs::write(dir.join("Dockerfile"), b"FROM python:slim\nCOPY app.py .\n").unwrap();
    std::fs::write(dir.join("app.py"), b"def handler(event, context): ...\n").unwrap();
    std::fs::write(dir.join("requirements.txt"), b"openai-whisper\n").unwrap();
}

fn deploy_config(dir: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.deploy.recipe_path = dir.join("Dockerfile");
    config.deploy.handler_path = dir.join("app.py");
    config.deploy.manifest_path = dir.join("requirements.txt");
    config.deploy.state_dir = dir.join(".scribe-deploy");
    config
}

fn outcome_of<'a>(reports: &'a [deploy::TaskReport], id: &str) -> &'a TaskOutcome {
    &reports.iter().find(|r| r.id == id).unwrap().outcome
}

#[tokio::test]
async fn first_deploy_builds_publishes_and_updates_function() {
    let dir = TempDir::new().unwrap();
    write_build_inputs(dir.path());
    let config = deploy_config(dir.path());

    let builder = FakeBuilder::new();
    let registry = FakeRegistry::new();
    let host = FakeHost::new();

    let reports = deploy::run_deploy(config, builder.clone(), registry.clone(), host.clone())
        .await
        .unwrap();

    assert_eq!(builder.builds(), 1);
    assert_eq!(host.updates(), 1);
    assert!(matches!(
        outcome_of(&reports, "build-publish"),
        TaskOutcome::Completed
    ));

    // Tag consistency: latest resolves to the same content as the version tag.
    let version = ImageReference::new("localhost:5000", "scribe-transcriber", "1.0.0");
    let latest = version.with_tag("latest");
    assert_eq!(
        registry.digest_for(&version).unwrap(),
        registry.digest_for(&latest).unwrap()
    );

    // The baseline was recorded for the next comparison.
    let state = DeployStateStore::new(dir.path().join(".scribe-deploy"))
        .load()
        .unwrap();
    assert!(state.baseline_fingerprint.is_some());
    assert_eq!(state.last_published_version.as_deref(), Some("1.0.0"));
    assert_eq!(state.staged_plan.as_deref(), Some("default"));
}

#[tokio::test]
async fn unchanged_inputs_skip_build_and_function_update() {
    let dir = TempDir::new().unwrap();
    write_build_inputs(dir.path());

    let builder = FakeBuilder::new();
    let registry = FakeRegistry::new();
    let host = FakeHost::new();

    deploy::run_deploy(
        deploy_config(dir.path()),
        builder.clone(),
        registry.clone(),
        host.clone(),
    )
    .await
    .unwrap();

    // Repeated deploy with no source changes: idempotent no-op on the build path.
    let reports = deploy::run_deploy(
        deploy_config(dir.path()),
        builder.clone(),
        registry.clone(),
        host.clone(),
    )
    .await
    .unwrap();

    assert_eq!(builder.builds(), 1);
    assert_eq!(host.updates(), 1);
    assert!(matches!(
        outcome_of(&reports, "build-publish"),
        TaskOutcome::Skipped { .. }
    ));
    assert!(matches!(
        outcome_of(&reports, "function-update"),
        TaskOutcome::Skipped { .. }
    ));
}

#[tokio::test]
async fn changed_input_triggers_rebuild() {
    let dir = TempDir::new().unwrap();
    write_build_inputs(dir.path());

    let builder = FakeBuilder::new();
    let registry = FakeRegistry::new();
    let host = FakeHost::new();

    deploy::run_deploy(
        deploy_config(dir.path()),
        builder.clone(),
        registry.clone(),
        host.clone(),
    )
    .await
    .unwrap();

    // One byte of one watched input changes.
    std::fs::write(
        dir.path().join("requirements.txt"),
        b"openai-whisper==20231117\n",
    )
    .unwrap();

    let reports = deploy::run_deploy(
        deploy_config(dir.path()),
        builder.clone(),
        registry.clone(),
        host.clone(),
    )
    .await
    .unwrap();

    assert_eq!(builder.builds(), 2);
    assert_eq!(host.updates(), 2);
    assert!(matches!(
        outcome_of(&reports, "build-publish"),
        TaskOutcome::Completed
    ));
}

#[tokio::test]
async fn failed_push_commits_nothing() {
    let dir = TempDir::new().unwrap();
    write_build_inputs(dir.path());

    let builder = FakeBuilder::new();
    let host = FakeHost::new();

    let err = deploy::run_deploy(
        deploy_config(dir.path()),
        builder.clone(),
        Arc::new(BrokenRegistry),
        host.clone(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::Push { .. }));
    assert!(err.is_publish_error());

    // No fingerprint baseline committed, no function update attempted.
    let state = DeployStateStore::new(dir.path().join(".scribe-deploy"))
        .load()
        .unwrap();
    assert_eq!(state.baseline_fingerprint, None);
    assert_eq!(host.updates(), 0);

    // A retry against a working registry publishes from scratch.
    let registry = FakeRegistry::new();
    deploy::run_deploy(
        deploy_config(dir.path()),
        builder.clone(),
        registry.clone(),
        host.clone(),
    )
    .await
    .unwrap();
    assert_eq!(host.updates(), 1);
}

#[tokio::test]
async fn missing_watched_input_fails_fast() {
    let dir = TempDir::new().unwrap();
    write_build_inputs(dir.path());
    std::fs::remove_file(dir.path().join("app.py")).unwrap();

    let builder = FakeBuilder::new();
    let err = deploy::run_deploy(
        deploy_config(dir.path()),
        builder.clone(),
        FakeRegistry::new(),
        FakeHost::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::WatchedInput { .. }));
    assert_eq!(builder.builds(), 0);
}

#[tokio::test]
async fn concurrent_deploy_of_same_target_is_refused() {
    let dir = TempDir::new().unwrap();
    write_build_inputs(dir.path());
    let config = deploy_config(dir.path());

    let store = DeployStateStore::new(&config.deploy.state_dir);
    let _held = store.lock().unwrap();

    let err = deploy::run_deploy(config, FakeBuilder::new(), FakeRegistry::new(), FakeHost::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::LockHeld { .. }));
}

#[tokio::test]
async fn disabled_gateway_skips_stage_record() {
    let dir = TempDir::new().unwrap();
    write_build_inputs(dir.path());
    let mut config = deploy_config(dir.path());
    config.gateway_enabled = false;

    let reports = deploy::run_deploy(
        config,
        FakeBuilder::new(),
        FakeRegistry::new(),
        FakeHost::new(),
    )
    .await
    .unwrap();

    assert!(matches!(
        outcome_of(&reports, "stage-record"),
        TaskOutcome::Skipped { .. }
    ));
    let state = DeployStateStore::new(dir.path().join(".scribe-deploy"))
        .load()
        .unwrap();
    assert_eq!(state.staged_plan, None);
}
