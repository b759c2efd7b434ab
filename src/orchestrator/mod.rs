//! Deployment orchestration.
//!
//! The [`Orchestrator`] drives the end-to-end placement and creation
//! workflow: it consumes the allocator's plan, fans replica launches out
//! per node, runs every mutation as a compensating transaction, and
//! streams per-replica results back to the caller.

mod control;
mod create;
mod hook;
mod status;

pub use control::ControlType;
pub use hook::HookOutcome;

use crate::allocator::Allocator;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::store::Store;
use crate::types::{Container, Node};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Mandatory label marking containers managed by the core.
pub const ERU_MARK: &str = "ERU_MARK";
/// Mandatory label carrying encoded publish/health metadata.
pub const ERU_META: &str = "ERU_META";

/// The container deployment core.
///
/// Cheap to clone; all shared state lives behind the store.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) config: Config,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) allocator: Arc<dyn Allocator>,
}

impl Orchestrator {
    pub fn new(config: Config, store: Arc<dyn Store>, allocator: Arc<dyn Allocator>) -> Self {
        Self { config, store, allocator }
    }

    /// Run `f` on the node record while holding the node's distributed
    /// lock. All read-modify-write on a node's resource counters goes
    /// through here.
    pub(crate) async fn with_node_locked<F, Fut, T>(&self, nodename: &str, f: F) -> Result<T>
    where
        F: FnOnce(Node) -> Fut,
        Fut: Future<Output = Result<T>> + Send,
    {
        let key = format!("cnode_{}", nodename);
        let mut lock = self.store.create_lock(&key, self.config.lock_timeout())?;
        lock.lock().await?;
        let result = match self.store.get_node(nodename).await {
            Ok(node) => f(node).await,
            Err(e) => Err(e),
        };
        if let Err(e) = lock.unlock().await {
            warn!(key = %key, error = %e, "failed to release node lock");
        }
        result
    }

    /// Run `f` on the container record and its node's engine while holding
    /// the container's distributed lock.
    pub(crate) async fn with_container_locked<F, Fut, T>(&self, id: &str, f: F) -> Result<T>
    where
        F: FnOnce(Container, Arc<dyn Engine>) -> Fut,
        Fut: Future<Output = Result<T>> + Send,
    {
        let key = format!("ccontainer_{}", id);
        let mut lock = self.store.create_lock(&key, self.config.lock_timeout())?;
        lock.lock().await?;
        let result = async {
            let container = self.store.get_container(id).await?;
            let node = self.store.get_node(&container.nodename).await?;
            let engine = node.engine()?;
            f(container, engine).await
        }
        .await;
        if let Err(e) = lock.unlock().await {
            warn!(key = %key, error = %e, "failed to release container lock");
        }
        result
    }

    /// Resolve a node record and make sure the image is present on it.
    pub(crate) async fn get_and_prepare_node(&self, nodename: &str, image: &str) -> Result<Node> {
        let node = self.store.get_node(nodename).await?;
        node.engine()?.image_pull(image).await?;
        Ok(node)
    }
}
