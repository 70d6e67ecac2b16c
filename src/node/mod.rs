//! Node executors: one handler per node type.
//!
//! Executors are compute-only. They read an immutable [`NodeCtx`] and return
//! a [`NodeValue`]; committing results to the run context and resolving
//! downstream edges is the runner's job.

pub mod api_call;
pub mod condition;
pub mod input;
pub mod logic;
pub mod output;
pub mod text_generation;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::core::errors::Result;
use crate::flow::graph::{NodeConfig, NodeKind};
use crate::provider::TextGenProvider;

pub use api_call::ApiCallExec;
pub use input::InputExec;
pub use logic::LogicExec;
pub use output::OutputExec;
pub use text_generation::TextGenerationExec;

/// The values a node consumes, keyed by input handle and kept in
/// edge-definition order so single-input executors see a deterministic
/// "first" value.
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    entries: Vec<(String, Value)>,
}

impl NodeInputs {
    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The first input in edge order. Most node types take a single upstream
    /// value and use this.
    pub fn primary(&self) -> Option<&Value> {
        self.entries.first().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable context handed to an executor for one node invocation.
#[derive(Debug, Clone)]
pub struct NodeCtx {
    pub run_id: String,
    pub node_id: String,
    pub config: NodeConfig,
    pub inputs: NodeInputs,
    /// The caller-supplied input for this run, consumed by input nodes.
    pub initial_input: Option<String>,
}

/// What a node produced.
#[derive(Debug, Clone)]
pub enum NodeValue {
    /// A plain value propagated along all outgoing edges.
    Emit(Value),
    /// A logic node's verdict: the chosen branch plus the value it forwards.
    Branch { taken: bool, value: Value },
}

impl NodeValue {
    pub fn value(&self) -> &Value {
        match self {
            NodeValue::Emit(v) => v,
            NodeValue::Branch { value, .. } => value,
        }
    }
}

/// A handler for one node type.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    fn kind(&self) -> NodeKind;

    async fn execute(&self, ctx: &NodeCtx) -> Result<NodeValue>;
}

/// The full executor set a runner dispatches through.
#[derive(Clone)]
pub struct Executors {
    input: Arc<dyn NodeExecutor>,
    text_generation: Arc<dyn NodeExecutor>,
    logic: Arc<dyn NodeExecutor>,
    api_call: Arc<dyn NodeExecutor>,
    output: Arc<dyn NodeExecutor>,
}

impl Executors {
    pub fn new(provider: Arc<dyn TextGenProvider>) -> Self {
        Self {
            input: Arc::new(InputExec),
            text_generation: Arc::new(TextGenerationExec::new(provider)),
            logic: Arc::new(LogicExec),
            api_call: Arc::new(ApiCallExec::new()),
            output: Arc::new(OutputExec),
        }
    }

    pub fn for_kind(&self, kind: NodeKind) -> Arc<dyn NodeExecutor> {
        match kind {
            NodeKind::Input => self.input.clone(),
            NodeKind::TextGeneration => self.text_generation.clone(),
            NodeKind::Logic => self.logic.clone(),
            NodeKind::ApiCall => self.api_call.clone(),
            NodeKind::Output => self.output.clone(),
        }
    }
}
