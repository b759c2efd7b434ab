//! gantry-core
//!
//! The container deployment core of the Gantry cluster orchestrator:
//! resource-allocated, transactional, per-node concurrent container
//! launches with a streaming result channel. The scheduler, the node
//! runtimes and the metadata store are consumed through traits; this
//! crate owns the workflow between them.

pub mod allocator;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod store;
pub mod txn;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use allocator::Allocator;
pub use config::Config;
pub use engine::Engine;
pub use error::{GantryError, Result};
pub use orchestrator::{ControlType, Orchestrator, ERU_MARK, ERU_META};
pub use store::{DistributedLock, ResourceAction, Store};
pub use types::{
    Container, ContainerStatus, ControlContainerMessage, CpuMap, CreateContainerMessage,
    DeployOptions, Entrypoint, Hook, Node, NodeInfo, VolumeBinding, VolumeBindings, VolumeMap,
    VolumePlan,
};
