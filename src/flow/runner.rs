//! Run coordinator: drives a flow graph end to end.
//!
//! Readiness is resolved lazily while the run progresses (a work-list, not a
//! one-shot topological sort) because logic nodes decide at execution time
//! which outgoing branch stays active. Independent ready nodes execute
//! concurrently behind a semaphore; results are joined over a channel and
//! committed one at a time, so scheduling decisions stay deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::errors::{FlowError, Result};
use crate::flow::config::RunConfig;
use crate::flow::context::RunContext;
use crate::flow::events::{emit, EventSender, RunEventKind};
use crate::flow::graph::{FlowGraph, Node, NodeKind};
use crate::node::{Executors, NodeCtx, NodeInputs, NodeValue};
use crate::provider::{NoProvider, TextGenProvider};

/// Outcome of one flow invocation.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: String,
    pub success: bool,
    /// The formatted value of the output node that was reached.
    pub output: Option<String>,
    pub error: Option<FlowError>,
    /// Every node value produced before the run ended, for diagnostics.
    pub node_values: HashMap<String, Value>,
}

/// The wire-shaped reply the invocation layer returns to callers. Errors are
/// human-readable messages, never stack traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    fn completed(run_id: String, output: String, node_values: HashMap<String, Value>) -> Self {
        Self {
            run_id,
            success: true,
            output: Some(output),
            error: None,
            node_values,
        }
    }

    fn failed(run_id: String, error: FlowError, node_values: HashMap<String, Value>) -> Self {
        Self {
            run_id,
            success: false,
            output: None,
            error: Some(error),
            node_values,
        }
    }

    pub fn into_response(self) -> ExecuteResponse {
        ExecuteResponse {
            success: self.success,
            output: self.output,
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeState {
    Pending,
    Fired,
    Pruned,
}

/// Frontier bookkeeping for one run: edge resolution states plus which nodes
/// have been launched, executed or pruned.
struct WorkList<'g> {
    graph: &'g FlowGraph,
    edge_states: Vec<EdgeState>,
    incoming: HashMap<String, Vec<usize>>,
    outgoing: HashMap<String, Vec<usize>>,
    launched: HashSet<String>,
    executed: HashSet<String>,
    pruned: HashSet<String>,
}

/// Edges and nodes pruned by one commit, for event emission.
#[derive(Debug, Default)]
struct PrunedSet {
    nodes: Vec<(String, String)>, // (node id, via edge id)
}

impl<'g> WorkList<'g> {
    fn new(graph: &'g FlowGraph) -> Self {
        let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        for node in graph.nodes() {
            incoming.entry(node.id.clone()).or_default();
            outgoing.entry(node.id.clone()).or_default();
        }
        for (pos, edge) in graph.edges().iter().enumerate() {
            incoming.entry(edge.target.clone()).or_default().push(pos);
            outgoing.entry(edge.source.clone()).or_default().push(pos);
        }
        Self {
            graph,
            edge_states: vec![EdgeState::Pending; graph.edges().len()],
            incoming,
            outgoing,
            launched: HashSet::new(),
            executed: HashSet::new(),
            pruned: HashSet::new(),
        }
    }

    /// A node is ready when every incoming edge is resolved and at least one
    /// fired; entry nodes (no incoming edges) are ready from the start.
    fn is_ready(&self, node: &Node) -> bool {
        if self.launched.contains(&node.id) || self.pruned.contains(&node.id) {
            return false;
        }
        let incoming = &self.incoming[&node.id];
        if incoming.is_empty() {
            return true;
        }
        let resolved = incoming
            .iter()
            .all(|&i| self.edge_states[i] != EdgeState::Pending);
        let any_fired = incoming
            .iter()
            .any(|&i| self.edge_states[i] == EdgeState::Fired);
        resolved && any_fired
    }

    /// Ready nodes in ascending-id order (the deterministic tie-break).
    fn ready_nodes(&self) -> Vec<&'g Node> {
        let mut ready: Vec<&Node> = self
            .graph
            .nodes()
            .filter(|node| self.is_ready(node))
            .collect();
        ready.sort_by(|a, b| a.id.cmp(&b.id));
        ready
    }

    /// Inputs for a node: values of fired incoming edges in edge-definition
    /// order, keyed by target handle or source node id.
    fn gather_inputs(&self, node_id: &str, values: &RunContext) -> NodeInputs {
        let mut inputs = NodeInputs::default();
        for &pos in &self.incoming[node_id] {
            if self.edge_states[pos] != EdgeState::Fired {
                continue;
            }
            let edge = &self.graph.edges()[pos];
            let key = edge
                .target_handle
                .clone()
                .unwrap_or_else(|| edge.source.clone());
            inputs.push(key, values.get(&edge.source).unwrap_or(Value::Null));
        }
        inputs
    }

    /// Records a finished node and resolves its outgoing edges. For a branch
    /// verdict only the matching handle's edges fire; the rest are pruned,
    /// and pruning propagates through nodes left with no way to fire.
    fn commit(&mut self, node_id: &str, value: &NodeValue) -> PrunedSet {
        self.executed.insert(node_id.to_string());

        let mut pruned_edges = Vec::new();
        for &pos in &self.outgoing[node_id] {
            let edge = &self.graph.edges()[pos];
            let fired = match value {
                NodeValue::Branch { taken, .. } => {
                    let wanted = if *taken { "true" } else { "false" };
                    edge.source_handle.as_deref() == Some(wanted)
                }
                NodeValue::Emit(_) => true,
            };
            self.edge_states[pos] = if fired {
                EdgeState::Fired
            } else {
                pruned_edges.push(pos);
                EdgeState::Pruned
            };
        }

        let mut set = PrunedSet::default();
        for pos in pruned_edges {
            self.propagate_pruning(pos, &mut set);
        }
        set
    }

    /// Prunes the target of a pruned edge if it can no longer fire, then its
    /// downstream edges transitively.
    fn propagate_pruning(&mut self, edge_pos: usize, set: &mut PrunedSet) {
        let target = self.graph.edges()[edge_pos].target.clone();
        if self.pruned.contains(&target) || self.executed.contains(&target) {
            return;
        }
        let incoming = &self.incoming[&target];
        let all_pruned = incoming
            .iter()
            .all(|&i| self.edge_states[i] == EdgeState::Pruned);
        if !all_pruned {
            return;
        }

        self.pruned.insert(target.clone());
        set.nodes
            .push((target.clone(), self.graph.edges()[edge_pos].id.clone()));

        let downstream: Vec<usize> = self.outgoing[&target].clone();
        for pos in downstream {
            if self.edge_states[pos] == EdgeState::Pending {
                self.edge_states[pos] = EdgeState::Pruned;
                self.propagate_pruning(pos, set);
            }
        }
    }

    /// Node ids that neither executed nor were pruned.
    fn unresolved(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .graph
            .nodes()
            .filter(|n| !self.executed.contains(&n.id) && !self.pruned.contains(&n.id))
            .map(|n| n.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Executes flow graphs. Holds the node executor set, the text-generation
/// provider and the run configuration; one runner serves many runs, each
/// with its own context.
pub struct FlowRunner {
    config: RunConfig,
    executors: Executors,
    event_tx: Option<EventSender>,
}

impl Default for FlowRunner {
    /// A runner with no text-generation provider. Flows without
    /// text-generation nodes run normally; one that reaches such a node
    /// fails with `ProviderError`.
    fn default() -> Self {
        Self::new(Arc::new(NoProvider))
    }
}

impl FlowRunner {
    pub fn new(provider: Arc<dyn TextGenProvider>) -> Self {
        Self {
            config: RunConfig::default(),
            executors: Executors::new(provider),
            event_tx: None,
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Streams run events to the given channel.
    pub fn with_event_channel(mut self, tx: EventSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Runs a graph to completion. See [`RunResult`].
    pub async fn run(&self, graph: &FlowGraph, initial_input: Option<&str>) -> RunResult {
        let (_tx, rx) = oneshot::channel();
        self.run_with_cancel(graph, initial_input, rx).await
    }

    /// Runs a graph. Sending on the cancel channel aborts the run with
    /// `Cancelled`; merely dropping the sender does not. In-flight node
    /// executions are abandoned best-effort, and no partial output is
    /// committed.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn run_with_cancel(
        &self,
        graph: &FlowGraph,
        initial_input: Option<&str>,
        cancel_rx: oneshot::Receiver<()>,
    ) -> RunResult {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        if let Err(e) = self.config.validate() {
            return RunResult::failed(run_id, e, HashMap::new());
        }

        let values = RunContext::new();
        let drive = self.drive(graph, initial_input, &run_id, &values);
        tokio::pin!(drive);

        let timeout_seconds = self.config.timeout_seconds;
        let deadline = async {
            match timeout_seconds {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        // A dropped sender means "no one can cancel anymore", not "cancel".
        let cancelled = async {
            match cancel_rx.await {
                Ok(()) => (),
                Err(_) => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            result = &mut drive => result,
            _ = cancelled => Err(FlowError::Cancelled),
            _ = deadline => Err(FlowError::Timeout {
                seconds: timeout_seconds.unwrap_or(0),
            }),
        };

        let result = match outcome {
            Ok(output) => RunResult::completed(run_id.clone(), output, values.snapshot()),
            Err(error) => {
                warn!(run_id = %run_id, error = %error, "run failed");
                RunResult::failed(run_id.clone(), error, values.snapshot())
            }
        };
        emit(
            &self.event_tx,
            &run_id,
            RunEventKind::RunFinished {
                success: result.success,
                error: result.error.as_ref().map(|e| e.to_string()),
            },
        );
        result
    }

    /// The invocation contract the HTTP layer exposes to callers.
    pub async fn execute(&self, graph: &FlowGraph, user_input: &str) -> ExecuteResponse {
        self.run(graph, Some(user_input)).await.into_response()
    }

    /// The work-list loop: launch ready nodes, join one completion, resolve
    /// downstream edges, repeat until the frontier empties.
    async fn drive(
        &self,
        graph: &FlowGraph,
        initial_input: Option<&str>,
        run_id: &str,
        values: &RunContext,
    ) -> Result<String> {
        if graph.node_count() == 0 {
            return Err(FlowError::MalformedGraph(
                "graph contains no nodes".to_string(),
            ));
        }

        let mut work = WorkList::new(graph);
        let mut outputs: BTreeMap<String, String> = BTreeMap::new();

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_nodes));
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, u64, Result<NodeValue>)>();
        let mut active: usize = 0;

        loop {
            let ready = work.ready_nodes();
            let ready_count = ready.len();

            for node in ready {
                work.launched.insert(node.id.clone());
                let ctx = NodeCtx {
                    run_id: run_id.to_string(),
                    node_id: node.id.clone(),
                    config: node.config.clone(),
                    inputs: work.gather_inputs(&node.id, values),
                    initial_input: initial_input.map(|s| s.to_string()),
                };
                emit(
                    &self.event_tx,
                    run_id,
                    RunEventKind::NodeStarted {
                        node_id: node.id.clone(),
                        kind: node.kind().as_str().to_string(),
                    },
                );

                let executor = self.executors.for_kind(node.kind());
                if self.config.enable_parallel_execution {
                    let permit = semaphore.clone().acquire_owned().await.unwrap();
                    let tx = tx.clone();
                    let node_id = node.id.clone();
                    debug!(node_id = %node_id, active, "launching node");
                    tokio::spawn(async move {
                        let started = tokio::time::Instant::now();
                        let result = executor.execute(&ctx).await;
                        let elapsed_ms = started.elapsed().as_millis() as u64;
                        debug!(node_id = %ctx.node_id, elapsed_ms, "node finished");
                        drop(permit);
                        let _ = tx.send((node_id, elapsed_ms, result));
                    });
                    active += 1;
                } else {
                    let started = tokio::time::Instant::now();
                    let result = executor.execute(&ctx).await;
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    self.complete(
                        &mut work,
                        &mut outputs,
                        values,
                        run_id,
                        &node.id,
                        elapsed_ms,
                        result,
                    )?;
                }
            }

            if self.config.enable_parallel_execution {
                if active == 0 && ready_count == 0 {
                    break;
                }
                match rx.recv().await {
                    Some((node_id, elapsed_ms, result)) => {
                        active -= 1;
                        // Fail fast: the first error aborts the run; still
                        // in-flight siblings are abandoned.
                        self.complete(
                            &mut work,
                            &mut outputs,
                            values,
                            run_id,
                            &node_id,
                            elapsed_ms,
                            result,
                        )?;
                    }
                    None => break,
                }
            } else if ready_count == 0 {
                break;
            }
        }

        let unresolved = work.unresolved();
        if !unresolved.is_empty() {
            return Err(FlowError::CyclicGraph(format!(
                "work-list stalled with unresolved nodes: {}",
                unresolved.join(", ")
            )));
        }

        match outputs.into_iter().next() {
            Some((node_id, output)) => {
                info!(run_id = %run_id, output_node = %node_id, "run completed");
                Ok(output)
            }
            None => Err(FlowError::NoOutputReached),
        }
    }

    /// Commits one node's result: stores the value, records output-node
    /// results and resolves downstream edges (with branch pruning). An
    /// executor error is reported as a failed `NodeFinished` and propagated.
    #[allow(clippy::too_many_arguments)]
    fn complete(
        &self,
        work: &mut WorkList<'_>,
        outputs: &mut BTreeMap<String, String>,
        values: &RunContext,
        run_id: &str,
        node_id: &str,
        elapsed_ms: u64,
        result: Result<NodeValue>,
    ) -> Result<()> {
        let value = match result {
            Ok(value) => value,
            Err(error) => {
                emit(
                    &self.event_tx,
                    run_id,
                    RunEventKind::NodeFinished {
                        node_id: node_id.to_string(),
                        success: false,
                        duration_ms: elapsed_ms,
                    },
                );
                return Err(error);
            }
        };
        values.insert(node_id, value.value().clone());

        if let Some(node) = work.graph.node(node_id) {
            if node.kind() == NodeKind::Output {
                let text = match value.value() {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                outputs.insert(node_id.to_string(), text);
            }
        }

        emit(
            &self.event_tx,
            run_id,
            RunEventKind::NodeFinished {
                node_id: node_id.to_string(),
                success: true,
                duration_ms: elapsed_ms,
            },
        );

        let pruned = work.commit(node_id, &value);
        for (pruned_node, via_edge) in pruned.nodes {
            debug!(node_id = %pruned_node, via_edge = %via_edge, "branch pruned");
            emit(
                &self.event_tx,
                run_id,
                RunEventKind::BranchPruned {
                    node_id: pruned_node,
                    via_edge,
                },
            );
        }
        Ok(())
    }
}
