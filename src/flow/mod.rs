pub mod config;
pub mod context;
pub mod events;
pub mod graph;
pub mod runner;

pub use config::RunConfig;
pub use context::RunContext;
pub use events::{EventSender, RunEvent, RunEventKind};
pub use graph::{Edge, FlowGraph, Node, NodeConfig, NodeKind};
pub use runner::{ExecuteResponse, FlowRunner, RunResult};
