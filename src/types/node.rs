//! Node domain types.

use crate::engine::Engine;
use crate::error::{GantryError, Result};
use crate::types::volume::VolumePlan;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Mapping from logical-core ID to fractional share in 0.01-core units.
pub type CpuMap = HashMap<String, i64>;

/// A single host running the virtualization engine.
///
/// The engine handle is attached by the store when the record is resolved;
/// it is never serialized.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub podname: String,
    pub endpoint: String,
    /// Free CPU shares per logical core.
    pub cpu: CpuMap,
    /// Free memory bytes.
    pub memcap: i64,
    /// Free storage bytes.
    pub storage_cap: i64,
    /// Logical-core ID to NUMA node.
    pub numa: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub available: bool,
    #[serde(skip)]
    pub engine: Option<Arc<dyn Engine>>,
}

impl Node {
    /// The node's engine handle; resolving a node without one is a store bug.
    pub fn engine(&self) -> Result<Arc<dyn Engine>> {
        self.engine.clone().ok_or_else(|| GantryError::NilEngine { nodename: self.name.clone() })
    }

    /// The NUMA node shared by every core in the map, or "" when the cores
    /// span NUMA nodes or the topology is unknown.
    pub fn numa_node(&self, cpu: &CpuMap) -> String {
        let mut result = String::new();
        for core in cpu.keys() {
            match self.numa.get(core) {
                Some(node) if result.is_empty() || *node == result => result = node.clone(),
                _ => return String::new(),
            }
        }
        result
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("podname", &self.podname)
            .field("endpoint", &self.endpoint)
            .field("cpu", &self.cpu)
            .field("memcap", &self.memcap)
            .field("storage_cap", &self.storage_cap)
            .field("available", &self.available)
            .finish()
    }
}

/// Allocator output for one candidate node.
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub nodename: String,
    /// Number of replicas planned onto this node.
    pub deploy: usize,
    /// One CPU map per replica, or empty when CPU-unconstrained.
    pub cpu_plan: Vec<CpuMap>,
    /// One volume plan per replica, or empty when nothing is scheduled.
    pub volume_plans: Vec<VolumePlan>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_numa() -> Node {
        Node {
            name: "node-1".to_string(),
            numa: HashMap::from([
                ("0".to_string(), "n0".to_string()),
                ("1".to_string(), "n0".to_string()),
                ("2".to_string(), "n1".to_string()),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_numa_node_same_socket() {
        let node = node_with_numa();
        let cpu = CpuMap::from([("0".to_string(), 100), ("1".to_string(), 100)]);
        assert_eq!(node.numa_node(&cpu), "n0");
    }

    #[test]
    fn test_numa_node_spanning_sockets() {
        let node = node_with_numa();
        let cpu = CpuMap::from([("0".to_string(), 100), ("2".to_string(), 100)]);
        assert_eq!(node.numa_node(&cpu), "");
    }

    #[test]
    fn test_numa_node_unknown_core() {
        let node = node_with_numa();
        let cpu = CpuMap::from([("9".to_string(), 100)]);
        assert_eq!(node.numa_node(&cpu), "");
    }

    #[test]
    fn test_engine_missing() {
        let node = Node { name: "node-1".to_string(), ..Default::default() };
        assert!(matches!(node.engine(), Err(GantryError::NilEngine { .. })));
    }
}
