//! Core domain types for gantry.

pub mod container;
pub mod message;
pub mod node;
pub mod options;
pub mod volume;

// Re-exports
pub use container::{Container, ContainerStatus, LabelMeta};
pub use message::{ControlContainerMessage, CreateContainerMessage};
pub use node::{CpuMap, Node, NodeInfo};
pub use options::{DataPayloads, DataSource, DeployOptions, Entrypoint, HealthCheck, Hook, LogConfig};
pub use volume::{VolumeBinding, VolumeBindings, VolumeMap, VolumePlan, AUTO};
