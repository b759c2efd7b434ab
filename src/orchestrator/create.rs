//! The deployment pipeline.
//!
//! `create_container` validates the request, asks the allocator for a
//! plan, then launches one task per candidate node. Within a node,
//! replicas launch sequentially in index order; across nodes, order is
//! unspecified. Every replica produces exactly one message on the result
//! stream, failure or not, and the stream closes only after every node's
//! processing row has been compensated away.

use crate::error::{GantryError, Result};
use crate::metrics;
use crate::orchestrator::{Orchestrator, ERU_MARK, ERU_META};
use crate::store::ResourceAction;
use crate::txn::{self, txn};
use crate::types::{
    Container, CpuMap, CreateContainerMessage, DeployOptions, LabelMeta, Node, NodeInfo,
    VolumePlan,
};
use crate::utils;
use crate::engine::VirtualizationCreateOptions;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, instrument, warn};

impl Orchestrator {
    /// Deploy `opts.count` replicas across the pod and stream one
    /// [`CreateContainerMessage`] per replica.
    ///
    /// Validation and allocation failures return as `Err` before any
    /// message is produced. Once the stream is handed back, all failures
    /// are per-replica and travel inside the messages.
    #[instrument(skip_all, fields(appname = %opts.name, podname = %opts.podname))]
    pub async fn create_container(
        &self,
        mut opts: DeployOptions,
    ) -> Result<mpsc::Receiver<CreateContainerMessage>> {
        opts.normalize();
        opts.process_ident = utils::random_string(16);
        info!(
            ident = %opts.process_ident,
            count = opts.count,
            image = %opts.image,
            "creating containers"
        );

        if opts.count == 0 {
            return Err(GantryError::BadCount { count: opts.count });
        }
        if opts.memory < 0 {
            return Err(GantryError::BadMemory { memory: opts.memory });
        }
        if opts.cpu_quota < 0.0 {
            return Err(GantryError::BadCpuQuota { quota: opts.cpu_quota });
        }

        let nodes_info = match self.allocator.alloc(&opts).await {
            Ok(plan) => plan,
            Err(e) => {
                error!(ident = %opts.process_ident, error = %e, "resource allocation failed");
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(1);
        let opts = Arc::new(opts);
        let this = self.clone();
        tokio::spawn(async move {
            let mut workers = Vec::with_capacity(nodes_info.len());
            let mut index = 0;
            for node_info in nodes_info {
                metrics::record_deploy_count(&node_info.nodename, node_info.deploy);
                let worker = this.clone();
                let tx = tx.clone();
                let opts = opts.clone();
                let base = index;
                index += node_info.deploy;
                workers.push(tokio::spawn(async move {
                    worker.deploy_on_node(tx, opts, node_info, base).await;
                }));
            }
            // the stream closes once the last worker drops its sender
            drop(tx);
            for handle in workers {
                if let Err(e) = handle.await {
                    error!(error = %e, "node deployment task panicked");
                }
            }
        });

        Ok(rx)
    }

    /// Launch this node's replicas sequentially and stream their results.
    async fn deploy_on_node(
        &self,
        tx: mpsc::Sender<CreateContainerMessage>,
        opts: Arc<DeployOptions>,
        node_info: NodeInfo,
        base: usize,
    ) {
        let timeout = self.config.global_timeout();
        for i in 0..node_info.deploy {
            let message = self.create_replica(&opts, &node_info, base + i, i).await;

            // send+decrement is its own transaction: a caller that went away
            // must not orphan the counter update
            let store = self.store.clone();
            let opts_then = opts.clone();
            let nodename = node_info.nodename.clone();
            let remaining = node_info.deploy - i - 1;
            let tx = tx.clone();
            if let Err(e) = txn(
                move || async move {
                    tx.send(message)
                        .await
                        .map_err(|_| GantryError::Internal("result receiver dropped".to_string()))
                },
                move || async move {
                    store.update_processing(&opts_then, &nodename, remaining).await
                },
                txn::nothing,
                timeout,
            )
            .await
            {
                warn!(node = %node_info.nodename, error = %e, "result delivery or processing update failed");
            }
        }

        // compensation always runs: the processing row must be gone before
        // the stream can close
        let store = self.store.clone();
        let opts_comp = opts.clone();
        let ni = node_info.clone();
        if let Err(e) = txn(
            move || async move { store.delete_processing(&opts_comp, &ni).await },
            txn::nothing,
            txn::nothing,
            timeout,
        )
        .await
        {
            error!(node = %node_info.nodename, error = %e, "failed to remove processing status");
        }
    }

    /// Produce one replica's result: prepare the node, launch, and release
    /// the reservation when the launch left nothing behind.
    async fn create_replica(
        &self,
        opts: &Arc<DeployOptions>,
        node_info: &NodeInfo,
        seq: usize,
        i: usize,
    ) -> CreateContainerMessage {
        let cpu = node_info.cpu_plan.get(i).cloned().unwrap_or_default();
        let volume_plan = node_info.volume_plans.get(i).cloned().unwrap_or_default();
        let timeout = self.config.global_timeout();
        let started = Instant::now();

        let message = Arc::new(Mutex::new(CreateContainerMessage {
            podname: opts.podname.clone(),
            nodename: node_info.nodename.clone(),
            cpu: cpu.clone(),
            quota: opts.cpu_quota,
            memory: opts.memory,
            storage: opts.storage,
            volume_plan: volume_plan.clone(),
            ..Default::default()
        }));
        let node_slot: Arc<Mutex<Option<Node>>> = Arc::new(Mutex::new(None));

        let try_phase = {
            let worker = self.clone();
            let opts = opts.clone();
            let nodename = node_info.nodename.clone();
            let node_slot = node_slot.clone();
            move || async move {
                let node = worker.get_and_prepare_node(&nodename, &opts.image).await?;
                *node_slot.lock().await = Some(node);
                Ok(())
            }
        };

        let then_phase = {
            let worker = self.clone();
            let opts = opts.clone();
            let cpu = cpu.clone();
            let volume_plan = volume_plan.clone();
            let node_slot = node_slot.clone();
            let message = message.clone();
            move || async move {
                let node = node_slot
                    .lock()
                    .await
                    .take()
                    .ok_or_else(|| GantryError::Internal("prepared node missing".to_string()))?;
                let launched = worker.create_and_start(seq, &node, &opts, cpu, volume_plan).await;
                let launch_error = launched.error.clone();
                *message.lock().await = launched;
                match launch_error {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
        };

        let rollback = {
            let worker = self.clone();
            let nodename = node_info.nodename.clone();
            let cpu = cpu.clone();
            let volume_plan = volume_plan.clone();
            let message = message.clone();
            let (quota, memory, storage) = (opts.cpu_quota, opts.memory, opts.storage);
            move || async move {
                // a half-removed container keeps its reservation; the inner
                // rollback already reported the leak
                if !message.lock().await.container_id.is_empty() {
                    return Ok(());
                }
                let store = worker.store.clone();
                worker
                    .with_node_locked(&nodename, move |node| async move {
                        store
                            .update_node_resource(
                                &node,
                                &cpu,
                                quota,
                                memory,
                                storage,
                                &volume_plan.into_volume_map(),
                                ResourceAction::Incr,
                            )
                            .await
                    })
                    .await
            }
        };

        match txn(try_phase, then_phase, rollback, timeout).await {
            Ok(()) => {
                metrics::record_create_duration(started.elapsed().as_secs_f64());
                let m = message.lock().await;
                info!(container_id = %m.container_id, name = %m.container_name, "created container");
            }
            Err(e) => {
                metrics::record_deploy_error(&node_info.nodename);
                let mut m = message.lock().await;
                if m.error.is_none() {
                    m.error = Some(e);
                }
            }
        }

        let result = message.lock().await.clone();
        result
    }

    /// Drive one replica from engine create through persisted metadata.
    ///
    /// Always returns a fully seeded message; on failure the error rides
    /// inside it and the rollback has already run.
    async fn create_and_start(
        &self,
        seq: usize,
        node: &Node,
        opts: &Arc<DeployOptions>,
        cpu: CpuMap,
        volume_plan: VolumePlan,
    ) -> CreateContainerMessage {
        let timeout = self.config.global_timeout();

        let mut seeded = CreateContainerMessage {
            podname: opts.podname.clone(),
            nodename: node.name.clone(),
            cpu: cpu.clone(),
            quota: opts.cpu_quota,
            memory: opts.memory,
            storage: opts.storage,
            volume_plan: volume_plan.clone(),
            ..Default::default()
        };
        let engine = match node.engine() {
            Ok(engine) => engine,
            Err(e) => {
                seeded.error = Some(e);
                return seeded;
            }
        };

        let container = Arc::new(Mutex::new(Container {
            podname: opts.podname.clone(),
            nodename: node.name.clone(),
            cpu,
            quota: opts.cpu_quota,
            memory: opts.memory,
            storage: opts.storage,
            hook: opts.entrypoint.hook.clone(),
            privileged: opts.entrypoint.privileged,
            soft_limit: opts.soft_limit,
            image: opts.image.clone(),
            env: opts.env.clone(),
            user: opts.user.clone(),
            volumes: opts.volumes.clone(),
            volume_plan,
            ..Default::default()
        }));
        let message = Arc::new(Mutex::new(seeded));

        let try_phase = {
            let worker = self.clone();
            let engine = engine.clone();
            let opts = opts.clone();
            let node = node.clone();
            let container = container.clone();
            let message = message.clone();
            move || async move {
                let (cpu, volume_plan) = {
                    let c = container.lock().await;
                    (c.cpu.clone(), c.volume_plan.clone())
                };
                let options =
                    worker.make_virtualization_options(seq, &node, &opts, &cpu, &volume_plan);
                {
                    let mut c = container.lock().await;
                    c.name = options.name.clone();
                    c.labels = options.labels.clone();
                    message.lock().await.container_name = options.name.clone();
                }

                let created = engine.virtualization_create(&options).await?;
                container.lock().await.id = created.id.clone();

                // inject data payloads; any single failure fails the phase
                for (destination, source) in opts.data.iter() {
                    let mut reader = source.open()?;
                    engine
                        .virtualization_copy_to(&created.id, destination, &mut *reader, true, true)
                        .await?;
                }

                // after-create commands only apply to the initial start
                if !opts.after_create.is_empty() {
                    let mut c = container.lock().await;
                    if let Some(hook) = &c.hook {
                        let mut merged = hook.clone();
                        merged.after_start = opts
                            .after_create
                            .iter()
                            .cloned()
                            .chain(hook.after_start.iter().cloned())
                            .collect();
                        c.hook = Some(merged);
                    }
                }

                let snapshot = container.lock().await.clone();
                let hook_outputs =
                    worker.start_container(&engine, &snapshot, opts.ignore_hook).await?;
                message.lock().await.hook_outputs = hook_outputs;

                let info = engine.virtualization_inspect(&created.id).await?;
                if !info.networks.is_empty() {
                    message.lock().await.publish =
                        utils::make_publish_info(&info.networks, &opts.entrypoint.publish);
                }
                {
                    let mut c = container.lock().await;
                    if info.user != c.user {
                        c.user = info.user;
                    }
                    // restore the entrypoint hook for subsequent lifecycle use
                    c.hook = opts.entrypoint.hook.clone();
                }
                Ok(())
            }
        };

        let then_phase = {
            let worker = self.clone();
            let container = container.clone();
            let message = message.clone();
            move || async move {
                let snapshot = container.lock().await.clone();
                worker.store.add_container(&snapshot).await?;
                // a non-empty ID signals that the core tracks this container
                message.lock().await.container_id = snapshot.id;
                Ok(())
            }
        };

        let rollback = {
            let engine = engine.clone();
            let container = container.clone();
            let message = message.clone();
            move || async move {
                let id = container.lock().await.id.clone();
                if id.is_empty() {
                    return Ok(());
                }
                match engine.virtualization_remove(&id, true, true).await {
                    Ok(()) => {
                        message.lock().await.container_id.clear();
                        Ok(())
                    }
                    Err(e) => {
                        error!(container_id = %id, error = %e, "failed container not removed, leaking");
                        message.lock().await.container_id = id;
                        Err(e)
                    }
                }
            }
        };

        if let Err(e) = txn(try_phase, then_phase, rollback, timeout).await {
            let mut m = message.lock().await;
            if m.error.is_none() {
                m.error = Some(e);
            }
        }

        let result = message.lock().await.clone();
        result
    }

    /// Compose the engine-side create options for one replica.
    fn make_virtualization_options(
        &self,
        seq: usize,
        node: &Node,
        opts: &DeployOptions,
        cpu: &CpuMap,
        volume_plan: &VolumePlan,
    ) -> VirtualizationCreateOptions {
        let entry = &opts.entrypoint;
        let suffix = utils::random_string(6);
        let name = utils::make_container_name(&opts.name, &entry.name, &suffix);

        let mut env = opts.env.clone();
        env.push(format!("APP_NAME={}", opts.name));
        env.push(format!("ERU_POD={}", opts.podname));
        env.push(format!("ERU_NODE_NAME={}", node.name));
        env.push(format!("ERU_CONTAINER_NO={}", seq));
        env.push(format!("ERU_MEMORY={}", opts.memory));
        env.push(format!("ERU_STORAGE={}", opts.storage));

        // user labels first; the mandatory keys always win
        let mut labels = opts.labels.clone();
        labels.insert(ERU_MARK.to_string(), "1".to_string());
        labels.insert(
            ERU_META.to_string(),
            utils::encode_meta_in_label(&LabelMeta {
                publish: entry.publish.clone(),
                health_check: entry.health_check.clone(),
            }),
        );

        let (log_type, log_config) = match &entry.log {
            Some(log) => (log.log_type.clone(), log.config.clone()),
            None => (String::new(), HashMap::new()),
        };

        VirtualizationCreateOptions {
            seq,
            name,
            user: opts.user.clone(),
            image: opts.image.clone(),
            working_dir: entry.dir.clone(),
            stdin: opts.open_stdin,
            privileged: entry.privileged,
            lambda: opts.lambda,
            cmd: utils::make_command_line_args(&format!("{} {}", entry.command, opts.extra_args)),
            env,
            dns: opts.dns.clone(),
            hosts: opts.extra_hosts.clone(),
            publish: entry.publish.clone(),
            sysctls: entry.sysctls.clone(),
            labels,
            cpu: cpu.clone(),
            quota: opts.cpu_quota,
            memory: opts.memory,
            storage: opts.storage,
            soft_limit: opts.soft_limit,
            numa_node: node.numa_node(cpu),
            network: opts.network_mode.clone(),
            networks: opts.networks.clone(),
            volumes: opts.volumes.apply_plan(volume_plan).to_strings(false, true),
            volume_plan: volume_plan.to_literal(),
            restart_policy: entry.restart_policy.clone(),
            log_type,
            log_config,
            raw_args: opts.raw_args.clone(),
            debug: opts.debug,
        }
    }
}
