//! Deployment request types.

use crate::error::Result;
use crate::types::volume::VolumeBindings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Pre/post command sequences executed through the engine's exec facility.
///
/// `force` promotes a hook failure to a hard failure of the surrounding
/// operation; without it failures are logged and ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hook {
    pub before_start: Vec<String>,
    pub after_start: Vec<String>,
    pub before_stop: Vec<String>,
    pub force: bool,
}

/// Engine log driver selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(rename = "type")]
    pub log_type: String,
    pub config: HashMap<String, String>,
}

/// Health probe definition carried in the meta label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCheck {
    pub tcp_ports: Vec<String>,
    pub http_port: String,
    pub url: String,
    pub code: i32,
}

/// How one process of the application runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entrypoint {
    pub name: String,
    pub command: String,
    pub dir: String,
    pub privileged: bool,
    pub restart_policy: String,
    pub sysctls: HashMap<String, String>,
    /// Ports the entrypoint publishes, e.g. `"8080/tcp"`.
    pub publish: Vec<String>,
    pub log: Option<LogConfig>,
    pub health_check: Option<HealthCheck>,
    pub hook: Option<Hook>,
}

/// A reopenable source of bytes injected into a container after create.
///
/// Each replica opens its own reader, so the source must be re-readable.
pub trait DataSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>>;
}

impl DataSource for Vec<u8> {
    fn open(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        Ok(Box::new(std::io::Cursor::new(self.clone())))
    }
}

/// Inline data payloads keyed by destination path inside the container.
#[derive(Clone, Default)]
pub struct DataPayloads(pub HashMap<String, Arc<dyn DataSource>>);

impl DataPayloads {
    pub fn insert(&mut self, destination: impl Into<String>, source: Arc<dyn DataSource>) {
        self.0.insert(destination.into(), source);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn DataSource>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DataPayloads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

/// The immutable deployment request.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Application name.
    pub name: String,
    pub entrypoint: Entrypoint,
    pub podname: String,
    pub image: String,
    /// Environment in `KEY=value` form.
    pub env: Vec<String>,
    pub user: String,
    pub open_stdin: bool,
    pub extra_hosts: Vec<String>,
    pub dns: Vec<String>,
    pub network_mode: String,
    /// Networks to join, name to requested address ("" for any).
    pub networks: HashMap<String, String>,
    /// Raw engine arguments passed through untouched.
    pub raw_args: String,
    pub lambda: bool,
    pub labels: HashMap<String, String>,
    /// Requested replica count.
    pub count: usize,
    /// Fractional CPU quota per replica.
    pub cpu_quota: f64,
    /// Memory bytes per replica.
    pub memory: i64,
    /// Storage bytes per replica.
    pub storage: i64,
    pub soft_limit: bool,
    pub volumes: VolumeBindings,
    /// Commands prepended to the after-start hook for the initial start.
    pub after_create: Vec<String>,
    /// Arguments appended to the entrypoint command.
    pub extra_args: String,
    pub data: DataPayloads,
    pub ignore_hook: bool,
    pub debug: bool,
    /// Random token assigned per request, for log correlation and
    /// processing-counter keys.
    pub process_ident: String,
}

impl DeployOptions {
    /// Fill derived defaults before validation.
    pub fn normalize(&mut self) {
        self.entrypoint.command = self.entrypoint.command.trim().to_string();
        self.extra_args = self.extra_args.trim().to_string();
        // fixed host mounts draw from the node's storage budget
        self.storage += self.volumes.additional_storage();
    }
}
