//! Container control operations: start, stop, restart.

use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::types::ControlContainerMessage;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

/// Which lifecycle transition to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

impl Orchestrator {
    /// Apply a lifecycle transition to a set of containers, one message
    /// per container. `force` ignores unforced hooks, mirroring deploy's
    /// ignore-hook flag.
    #[instrument(skip(self, ids), fields(count = ids.len(), control = %control))]
    pub async fn control_container(
        &self,
        ids: Vec<String>,
        control: ControlType,
        force: bool,
    ) -> Result<mpsc::Receiver<ControlContainerMessage>> {
        let (tx, rx) = mpsc::channel(1);
        let this = self.clone();
        tokio::spawn(async move {
            let mut workers = Vec::with_capacity(ids.len());
            for id in ids {
                let worker = this.clone();
                let tx = tx.clone();
                workers.push(tokio::spawn(async move {
                    let mut message =
                        ControlContainerMessage { container_id: id.clone(), ..Default::default() };
                    let inner = worker.clone();
                    let result = worker
                        .with_container_locked(&id, move |container, engine| async move {
                            match control {
                                ControlType::Start => {
                                    inner.start_container(&engine, &container, force).await
                                }
                                ControlType::Stop => {
                                    inner.stop_container(&engine, &container, force).await
                                }
                                ControlType::Restart => {
                                    let mut outputs =
                                        inner.stop_container(&engine, &container, force).await?;
                                    outputs.extend(
                                        inner.start_container(&engine, &container, force).await?,
                                    );
                                    Ok(outputs)
                                }
                            }
                        })
                        .await;
                    match result {
                        Ok(outputs) => {
                            info!(container_id = %id, control = %control, "control succeeded");
                            message.hook_outputs = outputs;
                        }
                        Err(e) => {
                            error!(container_id = %id, control = %control, error = %e, "control failed");
                            message.error = Some(e);
                        }
                    }
                    // the lock is already released; a slow consumer must not
                    // extend the critical section
                    if tx.send(message).await.is_err() {
                        warn!(container_id = %id, "control result receiver dropped");
                    }
                }));
            }
            drop(tx);
            for handle in workers {
                if let Err(e) = handle.await {
                    error!(error = %e, "control task panicked");
                }
            }
        });
        Ok(rx)
    }
}
