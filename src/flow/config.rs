//! Runner configuration.

use serde::{Deserialize, Serialize};

use crate::core::errors::{FlowError, Result};

fn default_timeout_seconds() -> Option<u64> {
    Some(300)
}

fn default_max_parallel_nodes() -> usize {
    3
}

fn default_enable_parallel() -> bool {
    true
}

/// Configuration for flow-run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Wall-clock bound for a whole run; `None` disables the timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: Option<u64>,
    /// Maximum number of independent ready nodes executed concurrently.
    #[serde(default = "default_max_parallel_nodes")]
    pub max_parallel_nodes: usize,
    /// When false, ready nodes run one at a time in ascending-id order.
    #[serde(default = "default_enable_parallel")]
    pub enable_parallel_execution: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_parallel_nodes: default_max_parallel_nodes(),
            enable_parallel_execution: default_enable_parallel(),
        }
    }
}

impl RunConfig {
    /// Validates configuration values.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout_seconds {
            if timeout == 0 {
                return Err(FlowError::Config(
                    "timeout_seconds must be greater than 0".to_string(),
                ));
            }
            if timeout > 86_400 {
                return Err(FlowError::Config(
                    "timeout_seconds cannot exceed 24 hours".to_string(),
                ));
            }
        }
        if self.max_parallel_nodes == 0 {
            return Err(FlowError::Config(
                "max_parallel_nodes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = RunConfig {
            timeout_seconds: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_parallelism() {
        let config = RunConfig {
            max_parallel_nodes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
