//! Input capture node.

use async_trait::async_trait;
use serde_json::Value;

use super::{NodeCtx, NodeExecutor, NodeValue};
use crate::core::errors::{FlowError, Result};
use crate::flow::graph::{NodeConfig, NodeKind};

/// Produces the run's externally supplied value, falling back to the value
/// configured on the node. A required input with neither fails the run.
pub struct InputExec;

#[async_trait]
impl NodeExecutor for InputExec {
    fn kind(&self) -> NodeKind {
        NodeKind::Input
    }

    async fn execute(&self, ctx: &NodeCtx) -> Result<NodeValue> {
        let config = match &ctx.config {
            NodeConfig::Input(c) => c,
            other => {
                return Err(FlowError::MalformedGraph(format!(
                    "node '{}' is not an input node (got {})",
                    ctx.node_id,
                    other.kind().as_str()
                )))
            }
        };

        let value = ctx
            .initial_input
            .as_ref()
            .map(|s| Value::String(s.clone()))
            .or_else(|| config.value.clone());

        match value {
            Some(v) => Ok(NodeValue::Emit(v)),
            None if config.required => Err(FlowError::MissingRequiredInput {
                node_id: ctx.node_id.clone(),
            }),
            None => Ok(NodeValue::Emit(Value::Null)),
        }
    }
}
