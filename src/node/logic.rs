//! Logic node: evaluates a condition and picks the true or false branch.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{condition, NodeCtx, NodeExecutor, NodeValue};
use crate::core::errors::{FlowError, Result};
use crate::flow::graph::{NodeConfig, NodeKind};

/// Evaluates the configured boolean expression against the node's inputs and
/// emits a branch verdict. The forwarded value is the primary input, so a
/// downstream node on the chosen branch sees the value the logic node saw.
pub struct LogicExec;

#[async_trait]
impl NodeExecutor for LogicExec {
    fn kind(&self) -> NodeKind {
        NodeKind::Logic
    }

    async fn execute(&self, ctx: &NodeCtx) -> Result<NodeValue> {
        let config = match &ctx.config {
            NodeConfig::Logic(c) => c,
            other => {
                return Err(FlowError::MalformedGraph(format!(
                    "node '{}' is not a logic node (got {})",
                    ctx.node_id,
                    other.kind().as_str()
                )))
            }
        };

        let taken = condition::evaluate(&config.condition, &ctx.inputs).map_err(|e| {
            FlowError::ConditionEval {
                node_id: ctx.node_id.clone(),
                message: e.to_string(),
            }
        })?;

        debug!(node_id = %ctx.node_id, condition = %config.condition, taken, "branch decided");

        let value = ctx.inputs.primary().cloned().unwrap_or(Value::Null);
        Ok(NodeValue::Branch { taken, value })
    }
}
