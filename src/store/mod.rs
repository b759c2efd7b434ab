//! Metadata store abstraction.
//!
//! The store persists container records, node records and resource
//! counters, tracks in-flight processing counts for the allocator, and
//! hands out distributed locks. The core consumes this contract without
//! assuming anything about the backing technology.

use crate::error::Result;
use crate::types::{Container, ContainerStatus, CpuMap, DeployOptions, Node, NodeInfo, VolumeMap};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Direction of a node resource mutation. `Incr` releases a reservation,
/// `Decr` applies one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Incr,
    Decr,
}

/// A held-by-handle distributed lock.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    async fn lock(&mut self) -> Result<()>;
    async fn unlock(&mut self) -> Result<()>;
}

/// The cluster metadata store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve a node record with a live engine handle attached.
    async fn get_node(&self, nodename: &str) -> Result<Node>;

    /// Persist a container record. A record is only added once the
    /// container has started successfully.
    async fn add_container(&self, container: &Container) -> Result<()>;

    async fn get_container(&self, id: &str) -> Result<Container>;

    async fn get_containers(&self, ids: &[String]) -> Result<Vec<Container>>;

    /// Mutate a node's free resource counters. Callers must hold the
    /// node's distributed lock.
    #[allow(clippy::too_many_arguments)]
    async fn update_node_resource(
        &self,
        node: &Node,
        cpu: &CpuMap,
        quota: f64,
        memory: i64,
        storage: i64,
        volumes: &VolumeMap,
        action: ResourceAction,
    ) -> Result<()>;

    /// Record how many replicas of this request are still launching on the
    /// node. Best-effort last-writer-wins.
    async fn update_processing(
        &self,
        opts: &DeployOptions,
        nodename: &str,
        count: usize,
    ) -> Result<()>;

    /// Drop the processing row for this request and node.
    async fn delete_processing(&self, opts: &DeployOptions, node_info: &NodeInfo) -> Result<()>;

    /// Create (but do not acquire) a distributed lock for `key`.
    fn create_lock(&self, key: &str, ttl: Duration) -> Result<Box<dyn DistributedLock>>;

    /// Persist a raw status payload for a container.
    async fn set_container_status(
        &self,
        container: &Container,
        data: &[u8],
        ttl: i64,
    ) -> Result<()>;

    /// Watch container status changes matching the filters; empty filter
    /// strings match everything.
    async fn container_status_stream(
        &self,
        appname: &str,
        entrypoint: &str,
        nodename: &str,
        labels: &HashMap<String, String>,
    ) -> Result<mpsc::Receiver<ContainerStatus>>;
}
