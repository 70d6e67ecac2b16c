//! External HTTP call node.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{NodeCtx, NodeExecutor, NodeInputs, NodeValue};
use crate::core::errors::{FlowError, Result};
use crate::flow::graph::{ApiCallConfig, HttpMethod, NodeConfig, NodeKind};

/// Issues one HTTP request per the node's config, with `{{handle}}`
/// placeholders in the URL and body interpolated from the node's inputs.
/// Non-2xx responses and transport failures abort the run with
/// `ExternalCallError`.
pub struct ApiCallExec {
    client: reqwest::Client,
}

impl ApiCallExec {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ApiCallExec {
    fn default() -> Self {
        Self::new()
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replaces `{{key}}` placeholders with input values. `{{input}}` resolves
/// to the primary input when no handle named `input` exists. Unmatched
/// placeholders are left in place.
pub(crate) fn interpolate(template: &str, inputs: &NodeInputs) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                let replacement = inputs
                    .get(key)
                    .or_else(|| (key == "input").then(|| inputs.primary()).flatten());
                match replacement {
                    Some(v) => out.push_str(&render(v)),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn request_for(
    client: &reqwest::Client,
    config: &ApiCallConfig,
    inputs: &NodeInputs,
) -> reqwest::RequestBuilder {
    let url = interpolate(&config.url, inputs);
    let mut request = match config.method {
        HttpMethod::Get => client.get(&url),
        HttpMethod::Post => client.post(&url),
        HttpMethod::Put => client.put(&url),
        HttpMethod::Patch => client.patch(&url),
        HttpMethod::Delete => client.delete(&url),
    };

    for (name, value) in &config.headers {
        request = request.header(name, interpolate(value, inputs));
    }
    if let Some(body) = &config.body {
        request = request.body(interpolate(body, inputs));
    }
    request
}

#[async_trait]
impl NodeExecutor for ApiCallExec {
    fn kind(&self) -> NodeKind {
        NodeKind::ApiCall
    }

    async fn execute(&self, ctx: &NodeCtx) -> Result<NodeValue> {
        let config = match &ctx.config {
            NodeConfig::ApiCall(c) => c,
            other => {
                return Err(FlowError::MalformedGraph(format!(
                    "node '{}' is not an api-call node (got {})",
                    ctx.node_id,
                    other.kind().as_str()
                )))
            }
        };

        let external_err = |message: String| FlowError::ExternalCall {
            node_id: ctx.node_id.clone(),
            message,
        };

        debug!(node_id = %ctx.node_id, url = %config.url, method = ?config.method, "api call");

        let response = request_for(&self.client, config, &ctx.inputs)
            .send()
            .await
            .map_err(|e| external_err(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| external_err(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(external_err(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                interpolate(&config.url, &ctx.inputs),
                body.chars().take(200).collect::<String>()
            )));
        }

        // JSON responses become structured values, anything else stays text.
        let value = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        Ok(NodeValue::Emit(value))
    }
}
