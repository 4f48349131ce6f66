//! Multi-node mock cluster

use crate::jobs::{JobContext, JobOutcome, JobRegistry, NODE_RUNNER_PREFIX};
use crate::mock_node::{ClusterState, MockNode};
use flint_core::{Error, Result};
use flint_net::Address;
use flint_rpc::{NodeDescriptor, Value, WireProtocol};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

/// Mock cluster settings
#[derive(Clone)]
pub struct MockClusterConfig {
    /// Host every node binds to and advertises
    pub host: String,
    /// One entry per node; 0 picks a free port
    pub ports: Vec<u16>,
    /// Node names are `{name_prefix}_{index}`
    pub name_prefix: String,
    /// Must match the client's serialization settings
    pub wire: WireProtocol,
    pub jobs: JobRegistry,
}

impl MockClusterConfig {
    /// `count` nodes on free localhost ports
    pub fn new(count: usize) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ports: vec![0; count],
            name_prefix: NODE_RUNNER_PREFIX.to_string(),
            wire: WireProtocol::default(),
            jobs: JobRegistry::with_builtin_jobs(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_ports(mut self, ports: &[u16]) -> Self {
        self.ports = ports.to_vec();
        self
    }

    pub fn with_wire(mut self, wire: WireProtocol) -> Self {
        self.wire = wire;
        self
    }
}

/// A set of [`MockNode`]s sharing one member list and job registry.
///
/// Every node reports the full member list in node order.
pub struct MockCluster {
    nodes: Vec<MockNode>,
    state: Arc<ClusterState>,
}

impl MockCluster {
    /// Start `count` nodes on free localhost ports
    pub async fn start(count: usize) -> Result<Self> {
        Self::start_with(MockClusterConfig::new(count)).await
    }

    /// Start one node per port on `host`
    pub async fn start_on(host: &str, ports: &[u16]) -> Result<Self> {
        Self::start_with(MockClusterConfig::new(ports.len()).with_host(host).with_ports(ports)).await
    }

    pub async fn start_with(config: MockClusterConfig) -> Result<Self> {
        if config.ports.is_empty() {
            return Err(Error::InvalidArgument("Mock cluster needs at least one node".to_string()));
        }

        // bind everything first so the member list carries the real ports
        let mut listeners = Vec::with_capacity(config.ports.len());
        for port in &config.ports {
            let listener = TcpListener::bind((config.host.as_str(), *port)).await?;
            listeners.push(listener);
        }

        let mut descriptors = Vec::with_capacity(listeners.len());
        for (index, listener) in listeners.iter().enumerate() {
            descriptors.push(NodeDescriptor {
                id: Uuid::new_v4().to_string(),
                name: format!("{}_{}", config.name_prefix, index),
                host: config.host.clone(),
                port: listener.local_addr()?.port(),
            });
        }

        let state = Arc::new(ClusterState {
            members: RwLock::new(descriptors.clone()),
            jobs: config.jobs,
            wire: config.wire,
        });

        let nodes = listeners
            .into_iter()
            .zip(descriptors)
            .map(|(listener, descriptor)| MockNode::start(listener, descriptor, state.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { nodes, state })
    }

    pub fn nodes(&self) -> &[MockNode] {
        &self.nodes
    }

    /// Node by start order
    pub fn node(&self, index: usize) -> &MockNode {
        &self.nodes[index]
    }

    pub fn node_by_id(&self, id: &str) -> Option<&MockNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    /// Listening addresses, in start order
    pub fn addresses(&self) -> Vec<Address> {
        self.nodes.iter().map(|n| n.address().clone()).collect()
    }

    /// Jobs started across all nodes
    pub fn total_executions(&self) -> u64 {
        self.nodes.iter().map(MockNode::executions).sum()
    }

    /// Register or replace a job on every node
    pub fn register_job<F, Fut>(&self, name: &str, job: F)
    where
        F: Fn(JobContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        self.state.jobs.register(name, job);
    }

    /// Replace the member list reported to clients
    pub fn set_members(&self, members: Vec<NodeDescriptor>) {
        *self.state.members.write() = members;
    }

    /// Member list as currently reported
    pub fn members(&self) -> Vec<NodeDescriptor> {
        self.state.members.read().clone()
    }

    /// Stop every node
    pub async fn shutdown(&self) {
        for node in &self.nodes {
            node.shutdown().await;
        }
    }
}
