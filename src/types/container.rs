//! Persisted container types.

use crate::types::options::Hook;
use crate::types::volume::{VolumeBindings, VolumePlan};
use crate::types::CpuMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The metadata record the core keeps for a launched container.
///
/// Engine-side state belongs to the node; this record only references it
/// by ID. Engine handles are borrowed at call sites, never stored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    pub podname: String,
    pub nodename: String,
    /// Engine-assigned container ID.
    pub id: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    pub cpu: CpuMap,
    pub quota: f64,
    pub memory: i64,
    pub storage: i64,
    pub hook: Option<Hook>,
    pub privileged: bool,
    pub soft_limit: bool,
    pub image: String,
    pub env: Vec<String>,
    pub user: String,
    pub volumes: VolumeBindings,
    pub volume_plan: VolumePlan,
}

/// Publish/health metadata encoded into the mandatory meta label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelMeta {
    pub publish: Vec<String>,
    pub health_check: Option<crate::types::options::HealthCheck>,
}

/// A status observation for one container, as streamed from the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub id: String,
    pub running: bool,
    pub healthy: bool,
    pub networks: HashMap<String, String>,
    /// Opaque status payload set by the reporting agent.
    pub extension: Vec<u8>,
    /// True when the observation reports the container as gone.
    pub delete: bool,
}
