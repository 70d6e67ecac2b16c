//! Flow graph model: typed nodes, directed edges, structural validation.
//!
//! Graphs arrive as the JSON the visual builder persists:
//! `{ nodes: [{id, type, position, data}], edges: [{id, source, target, ...}] }`.
//! Builder-only fields (`position`, `viewport`) are ignored. Node `data` is
//! parsed into a per-type config struct at load time, so executors never
//! touch untyped JSON for configuration.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::core::errors::{FlowError, Result};

/// The closed set of node types the engine executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Input,
    TextGeneration,
    Logic,
    ApiCall,
    Output,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::TextGeneration => "text-generation",
            NodeKind::Logic => "logic",
            NodeKind::ApiCall => "api-call",
            NodeKind::Output => "output",
        }
    }
}

/// Configuration for an `input` node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputConfig {
    /// Fixed fallback value when the run supplies no external input.
    pub value: Option<Value>,
    /// When true, a missing value fails the run instead of producing null.
    pub required: bool,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

/// Configuration for a `text-generation` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerationConfig {
    pub model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Configuration for a `logic` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicConfig {
    /// Boolean expression over the node's inputs, e.g. `input.length > 0`.
    pub condition: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    #[default]
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "DELETE")]
    Delete,
}

/// Configuration for an `api-call` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallConfig {
    #[serde(default)]
    pub method: HttpMethod,
    /// Request URL; `{{handle}}` placeholders are interpolated from inputs.
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Body template, interpolated the same way as the URL.
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plaintext,
    Markdown,
    Html,
}

/// Configuration for an `output` node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Per-type node configuration, decoded from the builder's `data` record.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Input(InputConfig),
    TextGeneration(TextGenerationConfig),
    Logic(LogicConfig),
    ApiCall(ApiCallConfig),
    Output(OutputConfig),
}

impl NodeConfig {
    /// Decode a raw `data` record for the given node type.
    pub fn parse(kind: &str, data: Value) -> Result<Self> {
        let parse_err = |e: serde_json::Error| {
            FlowError::MalformedGraph(format!("invalid '{}' node config: {}", kind, e))
        };
        match kind {
            "input" => Ok(NodeConfig::Input(
                serde_json::from_value(data).map_err(parse_err)?,
            )),
            "text-generation" => {
                let config: TextGenerationConfig =
                    serde_json::from_value(data).map_err(parse_err)?;
                if !(0.0..=1.0).contains(&config.temperature) {
                    return Err(FlowError::MalformedGraph(format!(
                        "temperature {} out of range [0.0, 1.0]",
                        config.temperature
                    )));
                }
                Ok(NodeConfig::TextGeneration(config))
            }
            "logic" => Ok(NodeConfig::Logic(
                serde_json::from_value(data).map_err(parse_err)?,
            )),
            "api-call" => Ok(NodeConfig::ApiCall(
                serde_json::from_value(data).map_err(parse_err)?,
            )),
            "output" => Ok(NodeConfig::Output(
                serde_json::from_value(data).map_err(parse_err)?,
            )),
            other => Err(FlowError::MalformedGraph(format!(
                "unknown node type '{}'",
                other
            ))),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Input(_) => NodeKind::Input,
            NodeConfig::TextGeneration(_) => NodeKind::TextGeneration,
            NodeConfig::Logic(_) => NodeKind::Logic,
            NodeConfig::ApiCall(_) => NodeKind::ApiCall,
            NodeConfig::Output(_) => NodeKind::Output,
        }
    }
}

/// A node in the flow graph. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub config: NodeConfig,
}

impl Node {
    pub fn new(id: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }
}

/// A directed dependency between two nodes.
///
/// `source_handle` names the output port on the source; logic nodes use
/// `"true"`/`"false"` to distinguish their branches. `target_handle` names
/// the input port on the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<Edge>,
}

/// A validated flow graph.
///
/// Construction enforces the structural invariants: node ids are unique,
/// every edge endpoint references an existing node, logic-node branch edges
/// carry a `true`/`false` handle, and the graph is acyclic.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    dag: DiGraph<Node, usize>,
    edges: Vec<Edge>,
    indices: HashMap<String, NodeIndex>,
}

impl FlowGraph {
    /// Builds and validates a graph from already-typed nodes and edges.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        let mut dag = DiGraph::<Node, usize>::new();
        let mut indices = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if indices.contains_key(&node.id) {
                return Err(FlowError::MalformedGraph(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
            let id = node.id.clone();
            let idx = dag.add_node(node);
            indices.insert(id, idx);
        }

        for (edge_pos, edge) in edges.iter().enumerate() {
            let source = *indices.get(&edge.source).ok_or_else(|| {
                FlowError::MalformedGraph(format!(
                    "edge '{}' references missing source node '{}'",
                    edge.id, edge.source
                ))
            })?;
            let target = *indices.get(&edge.target).ok_or_else(|| {
                FlowError::MalformedGraph(format!(
                    "edge '{}' references missing target node '{}'",
                    edge.id, edge.target
                ))
            })?;

            if dag[source].kind() == NodeKind::Logic {
                match edge.source_handle.as_deref() {
                    Some("true") | Some("false") => {}
                    other => {
                        return Err(FlowError::MalformedGraph(format!(
                            "edge '{}' leaves logic node '{}' without a true/false handle (got {:?})",
                            edge.id, edge.source, other
                        )))
                    }
                }
            }

            dag.add_edge(source, target, edge_pos);
        }

        if is_cyclic_directed(&dag) {
            return Err(FlowError::CyclicGraph(
                "graph contains a dependency cycle".to_string(),
            ));
        }

        Ok(Self { dag, edges, indices })
    }

    /// Loads a graph from the builder's persisted JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(json)
            .map_err(|e| FlowError::MalformedGraph(format!("invalid graph JSON: {}", e)))?;

        let mut nodes = Vec::with_capacity(raw.nodes.len());
        for raw_node in raw.nodes {
            let config = NodeConfig::parse(&raw_node.kind, raw_node.data)?;
            nodes.push(Node::new(raw_node.id, config));
        }
        Self::new(nodes, raw.edges)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.indices.get(id).map(|idx| &self.dag[*idx])
    }

    pub fn node_count(&self) -> usize {
        self.dag.node_count()
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.dag.node_weights()
    }

    /// Outgoing edges of a node with their targets, in edge-definition order.
    pub fn outgoing(&self, id: &str) -> Vec<(&Edge, &Node)> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .filter_map(|e| self.node(&e.target).map(|n| (e, n)))
            .collect()
    }

    /// Incoming edges of a node, in edge-definition order.
    pub fn incoming(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.target == id).collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Nodes with no incoming edges; the scheduler seeds the run from these.
    pub fn entry_nodes(&self) -> Vec<&Node> {
        self.dag
            .node_weights()
            .filter(|n| !self.edges.iter().any(|e| e.target == n.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input_node(id: &str) -> Node {
        Node::new(id, NodeConfig::Input(InputConfig::default()))
    }

    fn output_node(id: &str) -> Node {
        Node::new(id, NodeConfig::Output(OutputConfig::default()))
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: None,
            target_handle: None,
        }
    }

    #[test]
    fn builds_a_simple_graph() {
        let graph = FlowGraph::new(
            vec![input_node("input-1"), output_node("output-1")],
            vec![edge("e1", "input-1", "output-1")],
        )
        .unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.entry_nodes().len(), 1);
        assert_eq!(graph.outgoing("input-1").len(), 1);
        assert_eq!(graph.incoming("output-1").len(), 1);
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let err = FlowGraph::new(vec![input_node("a"), input_node("a")], vec![]).unwrap_err();
        assert_eq!(err.kind(), "MalformedGraph");
    }

    #[test]
    fn rejects_dangling_edges() {
        let err = FlowGraph::new(vec![input_node("a")], vec![edge("e1", "a", "ghost")])
            .unwrap_err();
        assert_eq!(err.kind(), "MalformedGraph");
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn rejects_cycles() {
        let err = FlowGraph::new(
            vec![input_node("a"), input_node("b")],
            vec![edge("e1", "a", "b"), edge("e2", "b", "a")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), "CyclicGraph");
    }

    #[test]
    fn rejects_logic_edges_without_branch_handles() {
        let logic = Node::new(
            "if-1",
            NodeConfig::Logic(LogicConfig {
                condition: "input.length > 0".to_string(),
            }),
        );
        let err = FlowGraph::new(
            vec![logic, output_node("out")],
            vec![edge("e1", "if-1", "out")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), "MalformedGraph");
    }

    #[test]
    fn loads_builder_json_and_ignores_ui_fields() {
        let doc = json!({
            "nodes": [
                {"id": "input-1", "type": "input", "position": {"x": 10, "y": 20}, "data": {}},
                {"id": "gpt-1", "type": "text-generation", "position": {"x": 0, "y": 0},
                 "data": {"model": "gpt-4o", "systemPrompt": "You are a helpful assistant"}},
                {"id": "output-1", "type": "output", "data": {"format": "markdown"}}
            ],
            "edges": [
                {"id": "e1", "source": "input-1", "target": "gpt-1"},
                {"id": "e2", "source": "gpt-1", "target": "output-1"}
            ],
            "viewport": {"x": 0, "y": 0, "zoom": 1}
        });

        let graph = FlowGraph::from_json(&doc.to_string()).unwrap();
        assert_eq!(graph.node_count(), 3);

        match &graph.node("gpt-1").unwrap().config {
            NodeConfig::TextGeneration(c) => {
                assert_eq!(c.model, "gpt-4o");
                assert_eq!(c.system_prompt.as_deref(), Some("You are a helpful assistant"));
                assert_eq!(c.max_tokens, 1024);
            }
            other => panic!("unexpected config: {:?}", other),
        }
        match &graph.node("output-1").unwrap().config {
            NodeConfig::Output(c) => assert_eq!(c.format, OutputFormat::Markdown),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_node_types() {
        let doc = json!({
            "nodes": [{"id": "x", "type": "mystery", "data": {}}],
            "edges": []
        });
        let err = FlowGraph::from_json(&doc.to_string()).unwrap_err();
        assert_eq!(err.kind(), "MalformedGraph");
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let doc = json!({
            "nodes": [{"id": "g", "type": "text-generation",
                       "data": {"model": "m", "temperature": 1.5}}],
            "edges": []
        });
        let err = FlowGraph::from_json(&doc.to_string()).unwrap_err();
        assert_eq!(err.kind(), "MalformedGraph");
    }
}
