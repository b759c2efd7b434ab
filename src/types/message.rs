//! Streamed operation results.

use crate::error::GantryError;
use crate::types::volume::VolumePlan;
use crate::types::CpuMap;
use std::collections::HashMap;

/// Per-replica outcome of a deployment, streamed to the caller.
///
/// An empty `container_id` means the core does not track the container:
/// either creation failed before the engine assigned an ID, or rollback
/// removed it. A non-empty ID with an error set marks a leaked container
/// that rollback could not remove.
#[derive(Debug, Clone, Default)]
pub struct CreateContainerMessage {
    pub podname: String,
    pub nodename: String,
    pub container_id: String,
    pub container_name: String,
    pub cpu: CpuMap,
    pub quota: f64,
    pub memory: i64,
    pub storage: i64,
    pub volume_plan: VolumePlan,
    /// Network name to published "address:port" entries.
    pub publish: HashMap<String, Vec<String>>,
    /// Hook command to captured output lines.
    pub hook_outputs: HashMap<String, Vec<String>>,
    pub error: Option<GantryError>,
}

/// Per-container outcome of a control operation.
#[derive(Debug, Clone, Default)]
pub struct ControlContainerMessage {
    pub container_id: String,
    pub hook_outputs: HashMap<String, Vec<String>>,
    pub error: Option<GantryError>,
}
