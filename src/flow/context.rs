//! Per-run execution context: node id -> produced value.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The values produced by executed nodes during a single run.
///
/// Append-only while the run is in flight and discarded afterwards. Backed
/// by a `DashMap` because independent ready nodes may commit their values
/// concurrently; clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct RunContext {
    values: Arc<DashMap<String, Value>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the value a node produced.
    pub fn insert(&self, node_id: &str, value: Value) {
        self.values.insert(node_id.to_string(), value);
    }

    pub fn get(&self, node_id: &str) -> Option<Value> {
        self.values.get(node_id).map(|v| v.clone())
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.values.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of all node values, for the run report.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_and_get_round_trip() {
        let ctx = RunContext::new();
        ctx.insert("input-1", json!("hello"));
        assert_eq!(ctx.get("input-1"), Some(json!("hello")));
        assert!(ctx.get("missing").is_none());
    }

    #[test]
    fn clones_share_storage() {
        let ctx = RunContext::new();
        let alias = ctx.clone();
        alias.insert("n", json!(1));
        assert!(ctx.contains("n"));
        assert_eq!(ctx.len(), 1);
    }

}
