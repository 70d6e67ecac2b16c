//! Text-generation node: one synchronous call to the provider collaborator.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{NodeCtx, NodeExecutor, NodeValue};
use crate::core::errors::{FlowError, Result};
use crate::flow::graph::{NodeConfig, NodeKind};
use crate::provider::{GenerationRequest, TextGenProvider};

pub struct TextGenerationExec {
    provider: Arc<dyn TextGenProvider>,
}

impl TextGenerationExec {
    pub fn new(provider: Arc<dyn TextGenProvider>) -> Self {
        Self { provider }
    }
}

/// Renders an upstream value as the user-facing prompt text.
fn as_prompt_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl NodeExecutor for TextGenerationExec {
    fn kind(&self) -> NodeKind {
        NodeKind::TextGeneration
    }

    async fn execute(&self, ctx: &NodeCtx) -> Result<NodeValue> {
        let config = match &ctx.config {
            NodeConfig::TextGeneration(c) => c,
            other => {
                return Err(FlowError::MalformedGraph(format!(
                    "node '{}' is not a text-generation node (got {})",
                    ctx.node_id,
                    other.kind().as_str()
                )))
            }
        };

        let input = ctx.inputs.primary().map(as_prompt_text).unwrap_or_default();
        debug!(node_id = %ctx.node_id, model = %config.model, "calling provider");

        let request = GenerationRequest {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            input,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        let text = self
            .provider
            .generate(request)
            .await
            .map_err(|e| FlowError::Provider {
                node_id: ctx.node_id.clone(),
                message: e.to_string(),
            })?;

        Ok(NodeValue::Emit(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::graph::TextGenerationConfig;
    use crate::node::NodeInputs;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records the request it saw and replies with canned text.
    struct RecordingProvider {
        reply: String,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl TextGenProvider for RecordingProvider {
        async fn generate(&self, request: GenerationRequest) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl TextGenProvider for FailingProvider {
        async fn generate(&self, _request: GenerationRequest) -> anyhow::Result<String> {
            anyhow::bail!("provider unreachable")
        }
    }

    fn ctx(inputs: NodeInputs) -> NodeCtx {
        NodeCtx {
            run_id: "run".into(),
            node_id: "gpt-1".into(),
            config: NodeConfig::TextGeneration(TextGenerationConfig {
                model: "gpt-4o".into(),
                system_prompt: Some("You are a helpful assistant".into()),
                temperature: 0.7,
                max_tokens: 256,
            }),
            inputs,
            initial_input: None,
        }
    }

    #[tokio::test]
    async fn forwards_config_and_input_to_provider() {
        let provider = Arc::new(RecordingProvider {
            reply: "Why did the chicken...".into(),
            seen: Mutex::new(Vec::new()),
        });
        let exec = TextGenerationExec::new(provider.clone());

        let mut inputs = NodeInputs::default();
        inputs.push("input-1", json!("Tell me a joke"));

        let out = exec.execute(&ctx(inputs)).await.unwrap();
        assert_eq!(out.value(), &json!("Why did the chicken..."));

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gpt-4o");
        assert_eq!(seen[0].input, "Tell me a joke");
        assert_eq!(
            seen[0].system_prompt.as_deref(),
            Some("You are a helpful assistant")
        );
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_provider_error() {
        let exec = TextGenerationExec::new(Arc::new(FailingProvider));
        let err = exec.execute(&ctx(NodeInputs::default())).await.unwrap_err();
        assert_eq!(err.kind(), "ProviderError");
        assert!(err.to_string().contains("provider unreachable"));
    }
}
