//! agentflow - an execution engine for visual agent flows.
//!
//! A flow is a directed graph of typed nodes (input, text-generation, logic,
//! api-call, output) drawn in a builder UI and persisted as JSON. This crate
//! loads such a graph, validates it, and runs it: nodes execute in dependency
//! order, logic nodes prune the branch they reject, and the value reaching an
//! output node becomes the run's result.

pub mod core;
pub mod flow;
pub mod node;
pub mod provider;

// Re-exports for convenience
pub use core::errors::{FlowError, Result};
pub use flow::config::RunConfig;
pub use flow::context::RunContext;
pub use flow::events::{EventSender, RunEvent, RunEventKind};
pub use flow::graph::{Edge, FlowGraph, Node, NodeConfig, NodeKind, OutputFormat};
pub use flow::runner::{ExecuteResponse, FlowRunner, RunResult};
pub use node::{NodeCtx, NodeExecutor, NodeInputs, NodeValue};
pub use provider::{GenerationRequest, NoProvider, TextGenProvider};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct CannedProvider(&'static str);

    #[async_trait]
    impl TextGenProvider for CannedProvider {
        async fn generate(&self, _request: GenerationRequest) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn joke_flow_end_to_end() {
        let doc = json!({
            "nodes": [
                {"id": "input-1", "type": "input", "data": {"required": true}},
                {"id": "gpt-1", "type": "text-generation",
                 "data": {"model": "gpt-4o", "systemPrompt": "You are a helpful assistant"}},
                {"id": "output-1", "type": "output", "data": {"format": "plaintext"}}
            ],
            "edges": [
                {"id": "e1", "source": "input-1", "target": "gpt-1"},
                {"id": "e2", "source": "gpt-1", "target": "output-1"}
            ]
        });
        let graph = FlowGraph::from_json(&doc.to_string()).unwrap();
        let runner = FlowRunner::new(Arc::new(CannedProvider("Why did the chicken...")));

        let response = runner.execute(&graph, "Tell me a joke").await;
        assert!(response.success);
        assert_eq!(response.output.as_deref(), Some("Why did the chicken..."));
        assert!(response.error.is_none());
    }
}
