//! Error types for gantry-core.
//!
//! All errors use `thiserror` for ergonomic error handling. The enum is
//! `Clone` because deployment failures travel by value inside streamed
//! result messages while the rollback path logs them independently.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for gantry operations.
pub type Result<T> = std::result::Result<T, GantryError>;

/// Main error type for gantry-core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GantryError {
    // Deploy request validation errors
    #[error("invalid replica count: {count}")]
    BadCount { count: usize },

    #[error("invalid memory limit: {memory}")]
    BadMemory { memory: i64 },

    #[error("invalid CPU quota: {quota}")]
    BadCpuQuota { quota: f64 },

    // Volume model errors
    #[error("invalid volume spec: {spec}")]
    InvalidVolume { spec: String },

    #[error("invalid volume size in {spec}: {reason}")]
    InvalidVolumeSize { spec: String, reason: String },

    // Cluster state errors
    #[error("node not found: {nodename}")]
    NodeNotFound { nodename: String },

    #[error("node {nodename} has no engine attached")]
    NilEngine { nodename: String },

    #[error("container not found: {id}")]
    ContainerNotFound { id: String },

    #[error("insufficient resources: {reason}")]
    InsufficientResources { reason: String },

    // Engine errors
    #[error("engine {operation} failed: {reason}")]
    EngineFailed { operation: String, reason: String },

    // Store errors
    #[error("store {operation} failed: {reason}")]
    StoreFailed { operation: String, reason: String },

    #[error("lock {key} failed: {reason}")]
    LockFailed { key: String, reason: String },

    // Hook errors
    #[error("hook command {command:?} failed: {reason}")]
    HookFailed { command: String, reason: String },

    // Transaction errors
    #[error("operation exceeded deadline of {timeout:?}")]
    DeadlineExceeded { timeout: Duration },

    // Generic errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl GantryError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}
