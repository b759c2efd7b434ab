//! Configuration management.

use crate::error::{GantryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Core configuration.
///
/// The embedding daemon loads this once and hands it to the
/// [`Orchestrator`](crate::orchestrator::Orchestrator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound for every transaction phase, in seconds.
    pub global_timeout_secs: u64,
    /// TTL for distributed locks, in seconds.
    pub lock_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self { global_timeout_secs: 300, lock_timeout_secs: 30 }
    }
}

impl Config {
    /// Global timeout as a [`Duration`].
    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }

    /// Lock TTL as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Load configuration from a JSON file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| GantryError::Internal(format!("failed to read config: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| GantryError::Internal(format!("failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.global_timeout(), Duration::from_secs(300));
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/gantry.json").unwrap();
        assert_eq!(config.global_timeout_secs, 300);
    }
}
