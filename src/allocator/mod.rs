//! Resource allocator abstraction.

use crate::error::Result;
use crate::types::{DeployOptions, NodeInfo};
use async_trait::async_trait;

/// Computes placement for a deployment request.
///
/// Implementations take whatever pod/node locks they need, reserve
/// resources against live cluster state, and write per-node processing
/// counts equal to each [`NodeInfo::deploy`](crate::types::NodeInfo)
/// before returning, so the counts are live as soon as the plan is.
/// The deploy counts across the returned plan sum to the requested
/// replica count.
#[async_trait]
pub trait Allocator: Send + Sync {
    async fn alloc(&self, opts: &DeployOptions) -> Result<Vec<NodeInfo>>;
}
