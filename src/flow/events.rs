//! Typed events emitted while a flow runs.
//!
//! Event emission is optional and observational only: the runner sends on an
//! unbounded channel when one is configured and never blocks or fails a run
//! because of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// What happened, with per-kind payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEventKind {
    NodeStarted {
        node_id: String,
        kind: String,
    },
    NodeFinished {
        node_id: String,
        success: bool,
        duration_ms: u64,
    },
    BranchPruned {
        node_id: String,
        via_edge: String,
    },
    RunFinished {
        success: bool,
        error: Option<String>,
    },
}

/// Event envelope with run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: RunEventKind,
}

impl RunEvent {
    pub fn new(run_id: &str, event: RunEventKind) -> Self {
        Self {
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Sending half the runner holds; `None` means events are disabled.
pub type EventSender = mpsc::UnboundedSender<RunEvent>;

/// Emits an event if a sink is configured. A closed receiver is ignored.
pub fn emit(tx: &Option<EventSender>, run_id: &str, event: RunEventKind) {
    if let Some(tx) = tx {
        let _ = tx.send(RunEvent::new(run_id, event));
    }
}

/// Convenience payload accessor used by tests and diagnostics.
impl RunEventKind {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            RunEventKind::NodeStarted { node_id, .. }
            | RunEventKind::NodeFinished { node_id, .. }
            | RunEventKind::BranchPruned { node_id, .. } => Some(node_id),
            RunEventKind::RunFinished { .. } => None,
        }
    }
}
