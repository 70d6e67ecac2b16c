//! Terminal output node: formats the final upstream value.

use async_trait::async_trait;
use serde_json::Value;

use super::{NodeCtx, NodeExecutor, NodeValue};
use crate::core::errors::{FlowError, Result};
use crate::flow::graph::{NodeConfig, NodeKind, OutputFormat};

pub struct OutputExec;

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Blank-line-separated blocks become paragraphs, single newlines `<br>`.
fn to_html(text: &str) -> String {
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| format!("<p>{}</p>", escape_html(block.trim()).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats a value per the node's configured output format.
pub fn format_value(value: &Value, format: OutputFormat) -> String {
    match format {
        // Markdown output is the text as authored; plaintext is the same
        // rendering, the distinction matters to the caller, not the engine.
        OutputFormat::Plaintext | OutputFormat::Markdown => as_text(value),
        OutputFormat::Html => to_html(&as_text(value)),
    }
}

#[async_trait]
impl NodeExecutor for OutputExec {
    fn kind(&self) -> NodeKind {
        NodeKind::Output
    }

    async fn execute(&self, ctx: &NodeCtx) -> Result<NodeValue> {
        let config = match &ctx.config {
            NodeConfig::Output(c) => c,
            other => {
                return Err(FlowError::MalformedGraph(format!(
                    "node '{}' is not an output node (got {})",
                    ctx.node_id,
                    other.kind().as_str()
                )))
            }
        };

        let upstream = ctx.inputs.primary().cloned().unwrap_or(Value::Null);
        let formatted = format_value(&upstream, config.format);
        Ok(NodeValue::Emit(Value::String(formatted)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::graph::OutputConfig;
    use crate::node::NodeInputs;
    use serde_json::json;

    fn ctx(format: OutputFormat, upstream: Value) -> NodeCtx {
        let mut inputs = NodeInputs::default();
        inputs.push("input", upstream);
        NodeCtx {
            run_id: "run".into(),
            node_id: "output-1".into(),
            config: NodeConfig::Output(OutputConfig { format }),
            inputs,
            initial_input: None,
        }
    }

    #[tokio::test]
    async fn plaintext_passes_strings_through() {
        let out = OutputExec
            .execute(&ctx(OutputFormat::Plaintext, json!("hello")))
            .await
            .unwrap();
        assert_eq!(out.value(), &json!("hello"));
    }

    #[tokio::test]
    async fn structured_values_are_pretty_printed() {
        let out = OutputExec
            .execute(&ctx(OutputFormat::Plaintext, json!({"a": 1})))
            .await
            .unwrap();
        let text = out.value().as_str().unwrap();
        assert!(text.contains("\"a\": 1"));
    }

    #[test]
    fn html_escapes_and_wraps_paragraphs() {
        let html = format_value(&json!("a < b\n\nsecond & line"), OutputFormat::Html);
        assert_eq!(html, "<p>a &lt; b</p>\n<p>second &amp; line</p>");
    }

    #[test]
    fn html_single_newlines_become_breaks() {
        let html = format_value(&json!("one\ntwo"), OutputFormat::Html);
        assert_eq!(html, "<p>one<br>two</p>");
    }

    #[test]
    fn markdown_is_text_as_authored() {
        let md = format_value(&json!("# Title\n\nbody"), OutputFormat::Markdown);
        assert_eq!(md, "# Title\n\nbody");
    }
}
