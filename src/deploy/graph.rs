//! Explicit deploy task graph
//!
//! The pipeline's ordering constraints are stated as edges in a directed acyclic
//! graph and resolved by a topological executor, replacing any implicit
//! dependency resolution. Deploy-time work is a blocking pipeline: tasks run
//! serially in topological order, and the first failure aborts everything
//! downstream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::GatewayConfig;

use super::error::{DeployError, DeployResult};
use super::fingerprint::BuildFingerprint;
use super::image::{ImageDigest, ImageReference};
use super::state::{DeployState, DeployStateStore};

/// What a task did when it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The task decided it had nothing to do. Skips are first-class outcomes,
    /// not errors: an unchanged fingerprint makes the whole publish path a no-op.
    Skipped { reason: String },
}

/// Record of a successful publish within the current run.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub version: ImageReference,
    pub latest: ImageReference,
    pub digest: ImageDigest,
}

/// Shared mutable state threaded through the pipeline.
pub struct DeployContext {
    pub config: GatewayConfig,
    pub store: DeployStateStore,
    pub state: DeployState,
    /// Set by the fingerprint task.
    pub fingerprint: Option<BuildFingerprint>,
    /// Whether the computed fingerprint differs from the recorded baseline.
    pub fingerprint_changed: bool,
    /// Set by the publish task when it actually published.
    pub published: Option<PublishOutcome>,
}

impl DeployContext {
    pub fn new(config: GatewayConfig, store: DeployStateStore, state: DeployState) -> Self {
        Self {
            config,
            store,
            state,
            fingerprint: None,
            fingerprint_changed: false,
            published: None,
        }
    }
}

/// One step of the deploy pipeline.
#[async_trait]
pub trait DeployTask: Send + Sync {
    fn id(&self) -> &str;

    async fn run(&self, ctx: &mut DeployContext) -> DeployResult<TaskOutcome>;
}

/// Per-task entry in the pipeline report.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub id: String,
    pub outcome: TaskOutcome,
    pub duration_ms: u128,
}

/// Deploy pipeline as a compiled DAG.
pub struct DeployGraph {
    graph: DiGraph<Arc<dyn DeployTask>, ()>,
    index: HashMap<String, NodeIndex>,
    topo_order: Vec<NodeIndex>,
}

impl std::fmt::Debug for DeployGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployGraph")
            .field("execution_order", &self.execution_order())
            .finish()
    }
}

impl DeployGraph {
    /// Build and validate a pipeline from tasks and explicit ordering edges.
    ///
    /// Validation mirrors compilation: duplicate ids, unknown edge endpoints, and
    /// cycles are configuration errors caught before any task runs.
    pub fn compile(
        tasks: Vec<Arc<dyn DeployTask>>,
        edges: &[(&str, &str)],
    ) -> DeployResult<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for task in tasks {
            let id = task.id().to_string();
            if index.contains_key(&id) {
                return Err(DeployError::DuplicateTask(id));
            }
            let node = graph.add_node(task);
            index.insert(id, node);
        }

        for (from, to) in edges {
            let from_idx = *index
                .get(*from)
                .ok_or_else(|| DeployError::UnknownTask((*from).to_string()))?;
            let to_idx = *index
                .get(*to)
                .ok_or_else(|| DeployError::UnknownTask((*to).to_string()))?;
            graph.add_edge(from_idx, to_idx, ());
        }

        // Topological order doubles as the acyclicity check.
        let topo_order = toposort(&graph, None).map_err(|cycle| {
            DeployError::CycleDetected(graph[cycle.node_id()].id().to_string())
        })?;

        debug!(tasks = %topo_order.len(), "deploy pipeline compiled");

        Ok(Self {
            graph,
            index,
            topo_order,
        })
    }

    /// Task ids in execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.topo_order
            .iter()
            .map(|&idx| self.graph[idx].id())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Run every task serially in topological order.
    ///
    /// The first error aborts the pipeline; tasks downstream of a failure never
    /// run, so no partial state is committed past the failing step.
    pub async fn execute(&self, ctx: &mut DeployContext) -> DeployResult<Vec<TaskReport>> {
        let pipeline_start = Instant::now();
        let mut reports = Vec::with_capacity(self.topo_order.len());

        for &node_idx in &self.topo_order {
            let task = &self.graph[node_idx];
            let task_start = Instant::now();

            debug!(task = %task.id(), "running deploy task");
            let outcome = task.run(ctx).await?;
            let duration_ms = task_start.elapsed().as_millis();

            match &outcome {
                TaskOutcome::Completed => {
                    info!(task = %task.id(), duration_ms = %duration_ms, "deploy task completed");
                }
                TaskOutcome::Skipped { reason } => {
                    info!(task = %task.id(), reason = %reason, "deploy task skipped");
                }
            }

            reports.push(TaskReport {
                id: task.id().to_string(),
                outcome,
                duration_ms,
            });
        }

        info!(
            duration_ms = %pipeline_start.elapsed().as_millis(),
            tasks = %reports.len(),
            "deploy pipeline finished"
        );
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct RecordingTask {
        id: String,
    }

    #[async_trait]
    impl DeployTask for RecordingTask {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, ctx: &mut DeployContext) -> DeployResult<TaskOutcome> {
            // Reuse an unrelated state field as the execution trace.
            let trace = ctx.state.staged_plan.get_or_insert_with(String::new);
            trace.push_str(&self.id);
            trace.push(';');
            Ok(TaskOutcome::Completed)
        }
    }

    struct FailingTask;

    #[async_trait]
    impl DeployTask for FailingTask {
        fn id(&self) -> &str {
            "boom"
        }

        async fn run(&self, _ctx: &mut DeployContext) -> DeployResult<TaskOutcome> {
            Err(DeployError::build("toolchain exploded"))
        }
    }

    fn task(id: &str) -> Arc<dyn DeployTask> {
        Arc::new(RecordingTask { id: id.to_string() })
    }

    fn context(dir: &TempDir) -> DeployContext {
        DeployContext::new(
            GatewayConfig::default(),
            DeployStateStore::new(dir.path()),
            DeployState::default(),
        )
    }

    #[tokio::test]
    async fn executes_in_edge_order() {
        let graph = DeployGraph::compile(
            vec![task("c"), task("a"), task("b")],
            &[("a", "b"), ("b", "c")],
        )
        .unwrap();
        assert_eq!(graph.execution_order(), vec!["a", "b", "c"]);

        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let reports = graph.execute(&mut ctx).await.unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(ctx.state.staged_plan.as_deref(), Some("a;b;c;"));
    }

    #[tokio::test]
    async fn cycle_is_a_config_error() {
        let err = DeployGraph::compile(vec![task("a"), task("b")], &[("a", "b"), ("b", "a")])
            .unwrap_err();
        assert!(matches!(err, DeployError::CycleDetected(_)));
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn duplicate_and_unknown_tasks_rejected() {
        assert!(matches!(
            DeployGraph::compile(vec![task("a"), task("a")], &[]),
            Err(DeployError::DuplicateTask(_))
        ));
        assert!(matches!(
            DeployGraph::compile(vec![task("a")], &[("a", "ghost")]),
            Err(DeployError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn failure_aborts_downstream_tasks() {
        let graph = DeployGraph::compile(
            vec![task("first"), Arc::new(FailingTask), task("last")],
            &[("first", "boom"), ("boom", "last")],
        )
        .unwrap();

        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let err = graph.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, DeployError::Build { .. }));
        // Only the first task ran; nothing downstream of the failure executed.
        assert_eq!(ctx.state.staged_plan.as_deref(), Some("first;"));
    }
}
