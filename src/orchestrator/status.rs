//! Container status propagation.

use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::types::ContainerStatus;
use std::collections::HashMap;
use tokio::sync::mpsc;

impl Orchestrator {
    /// Validate and persist raw status payloads for a set of containers.
    /// TTLs are per container ID; absent means no expiry.
    pub async fn set_containers_status(
        &self,
        status: HashMap<String, Vec<u8>>,
        ttls: HashMap<String, i64>,
    ) -> Result<()> {
        for (id, data) in status {
            let container = self.store.get_container(&id).await?;
            let ttl = ttls.get(&id).copied().unwrap_or(0);
            self.store.set_container_status(&container, &data, ttl).await?;
        }
        Ok(())
    }

    /// Watch container status changes matching the filters; a passthrough
    /// to the store's watch channel.
    pub async fn container_status_stream(
        &self,
        appname: &str,
        entrypoint: &str,
        nodename: &str,
        labels: &HashMap<String, String>,
    ) -> Result<mpsc::Receiver<ContainerStatus>> {
        self.store.container_status_stream(appname, entrypoint, nodename, labels).await
    }
}
