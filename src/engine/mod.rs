//! Virtualization engine abstraction.
//!
//! Every node runtime integration implements the [`Engine`] trait. The core
//! makes no assumption about the backing technology; it only drives the
//! create/start/inspect/remove/exec/copy lifecycle through it.

use crate::error::Result;
use crate::types::CpuMap;
use crate::types::VolumeMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::io::AsyncRead;

/// Options composed by the core for one engine-side create call.
#[derive(Debug, Clone, Default)]
pub struct VirtualizationCreateOptions {
    /// Global replica sequence number within the request.
    pub seq: usize,
    pub name: String,
    pub user: String,
    pub image: String,
    pub working_dir: String,
    pub stdin: bool,
    pub privileged: bool,
    pub lambda: bool,
    pub cmd: Vec<String>,
    pub env: Vec<String>,
    pub dns: Vec<String>,
    pub hosts: Vec<String>,
    pub publish: Vec<String>,
    pub sysctls: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub cpu: CpuMap,
    pub quota: f64,
    pub memory: i64,
    pub storage: i64,
    pub soft_limit: bool,
    pub numa_node: String,
    pub network: String,
    pub networks: HashMap<String, String>,
    /// Mount specs in engine form, plan already applied.
    pub volumes: Vec<String>,
    /// Wire-literal volume plan for engines that track allocations.
    pub volume_plan: HashMap<String, VolumeMap>,
    pub restart_policy: String,
    pub log_type: String,
    pub log_config: HashMap<String, String>,
    pub raw_args: String,
    pub debug: bool,
}

/// Engine response to a create call.
#[derive(Debug, Clone, Default)]
pub struct VirtualizationCreated {
    pub id: String,
    pub name: String,
}

/// Runtime metadata reported by the engine for a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualizationInfo {
    pub id: String,
    pub user: String,
    pub image: String,
    pub running: bool,
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    /// Network name to assigned address.
    pub networks: HashMap<String, String>,
}

/// Options for one exec session inside a container.
#[derive(Debug, Clone, Default)]
pub struct ExecConfig {
    pub cmd: Vec<String>,
    pub env: Vec<String>,
    pub privileged: bool,
    pub working_dir: String,
}

/// A node's virtualization backend.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Pull an image onto the node, blocking until it is available.
    async fn image_pull(&self, image: &str) -> Result<()>;

    /// Create a container; the engine assigns and returns its ID.
    async fn virtualization_create(
        &self,
        options: &VirtualizationCreateOptions,
    ) -> Result<VirtualizationCreated>;

    /// Start a created container.
    async fn virtualization_start(&self, id: &str) -> Result<()>;

    /// Stop a running container.
    async fn virtualization_stop(&self, id: &str) -> Result<()>;

    /// Remove a container. `force` removes it even while running.
    async fn virtualization_remove(&self, id: &str, volumes: bool, force: bool) -> Result<()>;

    /// Fetch runtime metadata for a container.
    async fn virtualization_inspect(&self, id: &str) -> Result<VirtualizationInfo>;

    /// Copy a byte stream into the container filesystem at `destination`.
    async fn virtualization_copy_to(
        &self,
        id: &str,
        destination: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        copy_uid: bool,
        mkdir_parents: bool,
    ) -> Result<()>;

    /// Register an exec session; returns the exec ID.
    async fn exec_create(&self, id: &str, config: &ExecConfig) -> Result<String>;

    /// Run the exec session to completion, returning captured output lines.
    async fn exec_attach(&self, exec_id: &str) -> Result<Vec<String>>;

    /// Exit code of a finished exec session.
    async fn exec_exit_code(&self, exec_id: &str) -> Result<i32>;
}
