//! Shared mocks for orchestrator integration tests.
//!
//! Hand-rolled Engine/Store/Allocator fakes with failure injection, so the
//! tests run without any real runtime or metadata store behind them.

#![allow(dead_code)]

use async_trait::async_trait;
use gantry_core::allocator::Allocator;
use gantry_core::engine::{
    Engine, ExecConfig, VirtualizationCreateOptions, VirtualizationCreated, VirtualizationInfo,
};
use gantry_core::store::{DistributedLock, ResourceAction, Store};
use gantry_core::types::{
    Container, ContainerStatus, CpuMap, DeployOptions, Entrypoint, Node, NodeInfo, VolumeMap,
};
use gantry_core::{Config, GantryError, Orchestrator, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

pub const NODE: &str = "node-1";

/// Mock engine with per-call failure injection and call recording.
pub struct MockEngine {
    // failure injection, fixed at construction
    pub fail_pull: bool,
    /// Fail the nth create call (0-based).
    pub fail_create_at: Option<usize>,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub fail_remove: bool,
    pub fail_copy: bool,
    pub fail_exec_create: bool,
    pub fail_exec_attach: bool,
    pub fail_exec_exit: bool,
    pub exec_exit_code: i32,
    pub inspect_user: String,

    // call recording
    pub pulls: AtomicUsize,
    pub creates: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub removes: AtomicUsize,
    pub create_options: Mutex<Vec<VirtualizationCreateOptions>>,
    pub copied: Mutex<HashMap<String, Vec<u8>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            fail_pull: false,
            fail_create_at: None,
            fail_start: false,
            fail_stop: false,
            fail_remove: false,
            fail_copy: false,
            fail_exec_create: false,
            fail_exec_attach: false,
            fail_exec_exit: false,
            exec_exit_code: 0,
            inspect_user: String::new(),
            pulls: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            create_options: Mutex::new(Vec::new()),
            copied: Mutex::new(HashMap::new()),
        }
    }
}

fn engine_err(operation: &str) -> GantryError {
    GantryError::EngineFailed { operation: operation.to_string(), reason: "mock".to_string() }
}

#[async_trait]
impl Engine for MockEngine {
    async fn image_pull(&self, _image: &str) -> Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pull {
            return Err(engine_err("image_pull"));
        }
        Ok(())
    }

    async fn virtualization_create(
        &self,
        options: &VirtualizationCreateOptions,
    ) -> Result<VirtualizationCreated> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create_at == Some(n) {
            return Err(engine_err("create"));
        }
        self.create_options.lock().unwrap().push(options.clone());
        Ok(VirtualizationCreated { id: format!("cid-{}", n), name: options.name.clone() })
    }

    async fn virtualization_start(&self, _id: &str) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(engine_err("start"));
        }
        Ok(())
    }

    async fn virtualization_stop(&self, _id: &str) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(engine_err("stop"));
        }
        Ok(())
    }

    async fn virtualization_remove(&self, _id: &str, _volumes: bool, _force: bool) -> Result<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove {
            return Err(engine_err("remove"));
        }
        Ok(())
    }

    async fn virtualization_inspect(&self, id: &str) -> Result<VirtualizationInfo> {
        Ok(VirtualizationInfo {
            id: id.to_string(),
            user: self.inspect_user.clone(),
            running: true,
            networks: HashMap::from([("bridge".to_string(), "10.0.0.2".to_string())]),
            ..Default::default()
        })
    }

    async fn virtualization_copy_to(
        &self,
        _id: &str,
        destination: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        _copy_uid: bool,
        _mkdir_parents: bool,
    ) -> Result<()> {
        if self.fail_copy {
            return Err(engine_err("copy_to"));
        }
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await.map_err(GantryError::internal)?;
        self.copied.lock().unwrap().insert(destination.to_string(), buf);
        Ok(())
    }

    async fn exec_create(&self, _id: &str, _config: &ExecConfig) -> Result<String> {
        if self.fail_exec_create {
            return Err(engine_err("exec_create"));
        }
        Ok("exec-1".to_string())
    }

    async fn exec_attach(&self, _exec_id: &str) -> Result<Vec<String>> {
        if self.fail_exec_attach {
            return Err(engine_err("exec_attach"));
        }
        Ok(vec!["output".to_string()])
    }

    async fn exec_exit_code(&self, _exec_id: &str) -> Result<i32> {
        if self.fail_exec_exit {
            return Err(engine_err("exec_exit_code"));
        }
        Ok(self.exec_exit_code)
    }
}

#[derive(Default)]
pub struct MockLock;

#[async_trait]
impl DistributedLock for MockLock {
    async fn lock(&mut self) -> Result<()> {
        Ok(())
    }

    async fn unlock(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Mock store backed by in-memory maps, wired to one mock engine.
pub struct MockStore {
    pub engine: Arc<MockEngine>,
    pub containers: Mutex<HashMap<String, Container>>,

    pub fail_get_node: bool,
    pub fail_add_container: bool,
    pub fail_delete_processing: bool,
    pub fail_set_status: bool,

    pub incrs: AtomicUsize,
    pub decrs: AtomicUsize,
    pub processing_updates: Mutex<Vec<usize>>,
    pub delete_processing_calls: AtomicUsize,
    pub set_status_calls: AtomicUsize,
    pub status_stream: Mutex<Option<mpsc::Receiver<ContainerStatus>>>,
}

impl MockStore {
    pub fn new(engine: Arc<MockEngine>) -> Self {
        Self {
            engine,
            containers: Mutex::new(HashMap::new()),
            fail_get_node: false,
            fail_add_container: false,
            fail_delete_processing: false,
            fail_set_status: false,
            incrs: AtomicUsize::new(0),
            decrs: AtomicUsize::new(0),
            processing_updates: Mutex::new(Vec::new()),
            delete_processing_calls: AtomicUsize::new(0),
            set_status_calls: AtomicUsize::new(0),
            status_stream: Mutex::new(None),
        }
    }

    /// Seed a container record the way a finished deployment would.
    pub fn seed_container(&self, container: Container) {
        self.containers.lock().unwrap().insert(container.id.clone(), container);
    }
}

#[async_trait]
impl Store for MockStore {
    async fn get_node(&self, nodename: &str) -> Result<Node> {
        if self.fail_get_node {
            return Err(GantryError::NodeNotFound { nodename: nodename.to_string() });
        }
        Ok(Node {
            name: nodename.to_string(),
            podname: "dev".to_string(),
            available: true,
            engine: Some(self.engine.clone()),
            ..Default::default()
        })
    }

    async fn add_container(&self, container: &Container) -> Result<()> {
        if self.fail_add_container {
            return Err(GantryError::StoreFailed {
                operation: "add_container".to_string(),
                reason: "mock".to_string(),
            });
        }
        self.seed_container(container.clone());
        Ok(())
    }

    async fn get_container(&self, id: &str) -> Result<Container> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| GantryError::ContainerNotFound { id: id.to_string() })
    }

    async fn get_containers(&self, ids: &[String]) -> Result<Vec<Container>> {
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            result.push(self.get_container(id).await?);
        }
        Ok(result)
    }

    async fn update_node_resource(
        &self,
        _node: &Node,
        _cpu: &CpuMap,
        _quota: f64,
        _memory: i64,
        _storage: i64,
        _volumes: &VolumeMap,
        action: ResourceAction,
    ) -> Result<()> {
        match action {
            ResourceAction::Incr => self.incrs.fetch_add(1, Ordering::SeqCst),
            ResourceAction::Decr => self.decrs.fetch_add(1, Ordering::SeqCst),
        };
        Ok(())
    }

    async fn update_processing(
        &self,
        _opts: &DeployOptions,
        _nodename: &str,
        count: usize,
    ) -> Result<()> {
        self.processing_updates.lock().unwrap().push(count);
        Ok(())
    }

    async fn delete_processing(&self, _opts: &DeployOptions, _node_info: &NodeInfo) -> Result<()> {
        self.delete_processing_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete_processing {
            return Err(GantryError::StoreFailed {
                operation: "delete_processing".to_string(),
                reason: "mock".to_string(),
            });
        }
        Ok(())
    }

    fn create_lock(&self, _key: &str, _ttl: Duration) -> Result<Box<dyn DistributedLock>> {
        Ok(Box::new(MockLock))
    }

    async fn set_container_status(
        &self,
        _container: &Container,
        _data: &[u8],
        _ttl: i64,
    ) -> Result<()> {
        self.set_status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set_status {
            return Err(GantryError::StoreFailed {
                operation: "set_container_status".to_string(),
                reason: "mock".to_string(),
            });
        }
        Ok(())
    }

    async fn container_status_stream(
        &self,
        _appname: &str,
        _entrypoint: &str,
        _nodename: &str,
        _labels: &HashMap<String, String>,
    ) -> Result<mpsc::Receiver<ContainerStatus>> {
        self.status_stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| GantryError::Internal("no status stream configured".to_string()))
    }
}

pub struct MockAllocator {
    pub plan: Result<Vec<NodeInfo>>,
}

impl MockAllocator {
    /// A plan putting every replica on [`NODE`].
    pub fn single_node(deploy: usize) -> Self {
        Self {
            plan: Ok(vec![NodeInfo {
                nodename: NODE.to_string(),
                deploy,
                ..Default::default()
            }]),
        }
    }
}

#[async_trait]
impl Allocator for MockAllocator {
    async fn alloc(&self, _opts: &DeployOptions) -> Result<Vec<NodeInfo>> {
        self.plan.clone()
    }
}

/// Deploy options that pass validation.
pub fn base_options(count: usize) -> DeployOptions {
    DeployOptions {
        name: "app".to_string(),
        entrypoint: Entrypoint {
            name: "web".to_string(),
            command: "run server".to_string(),
            publish: vec!["8080/tcp".to_string()],
            ..Default::default()
        },
        podname: "dev".to_string(),
        image: "app:latest".to_string(),
        count,
        memory: 64 * 1024 * 1024,
        ..Default::default()
    }
}

pub fn make_orchestrator(store: Arc<MockStore>, allocator: MockAllocator) -> Orchestrator {
    Orchestrator::new(Config::default(), store, Arc::new(allocator))
}

/// Drain the result stream to completion.
pub async fn drain<T>(mut rx: mpsc::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Some(message) = rx.recv().await {
        out.push(message);
    }
    out
}
