use thiserror::Error;

/// Unified error type for the agentflow engine.
///
/// Structural errors (`MalformedGraph`, `CyclicGraph`) are produced while
/// loading a graph, before any node executes. The remaining variants abort a
/// run in progress; the run's context is discarded, so no rollback is needed.
#[derive(Debug, Error)]
pub enum FlowError {
    /// An edge references a node that does not exist, or a node id is reused.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// The graph contains a dependency cycle.
    #[error("cyclic graph: {0}")]
    CyclicGraph(String),

    /// An input node marked `required` received no value.
    #[error("missing required input for node '{node_id}'")]
    MissingRequiredInput { node_id: String },

    /// The language-model provider failed or was unreachable.
    #[error("provider error in node '{node_id}': {message}")]
    Provider { node_id: String, message: String },

    /// A logic node's condition expression could not be parsed or evaluated.
    #[error("condition error in node '{node_id}': {message}")]
    ConditionEval { node_id: String, message: String },

    /// An api-call node got a non-2xx response or a transport failure.
    #[error("external call failed in node '{node_id}': {message}")]
    ExternalCall { node_id: String, message: String },

    /// The run completed without any output node executing.
    #[error("no output node was reached")]
    NoOutputReached,

    /// The run was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,

    /// The run exceeded its configured wall-clock bound.
    #[error("run timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Invalid runner configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// Stable machine-readable name for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::MalformedGraph(_) => "MalformedGraph",
            FlowError::CyclicGraph(_) => "CyclicGraph",
            FlowError::MissingRequiredInput { .. } => "MissingRequiredInput",
            FlowError::Provider { .. } => "ProviderError",
            FlowError::ConditionEval { .. } => "ConditionEvalError",
            FlowError::ExternalCall { .. } => "ExternalCallError",
            FlowError::NoOutputReached => "NoOutputReached",
            FlowError::Cancelled => "Cancelled",
            FlowError::Timeout { .. } => "Timeout",
            FlowError::Config(_) => "ConfigError",
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(FlowError::NoOutputReached.kind(), "NoOutputReached");
        assert_eq!(
            FlowError::Provider {
                node_id: "gpt-1".into(),
                message: "boom".into()
            }
            .kind(),
            "ProviderError"
        );
    }

    #[test]
    fn messages_are_human_readable() {
        let err = FlowError::MissingRequiredInput {
            node_id: "input-1".into(),
        };
        assert_eq!(err.to_string(), "missing required input for node 'input-1'");
    }
}
