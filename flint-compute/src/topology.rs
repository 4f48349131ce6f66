//! Cached view of the cluster membership

use crate::node::{ClusterNode, NodeId};
use arc_swap::ArcSwapOption;
use flint_core::{Error, Result};
use flint_rpc::{RpcRequest, RpcResponse, Transport};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Immutable member list captured at one point in time
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    version: u64,
    nodes: Vec<ClusterNode>,
    taken_at: Instant,
}

impl TopologySnapshot {
    pub fn new(version: u64, nodes: Vec<ClusterNode>) -> Self {
        Self {
            version,
            nodes,
            taken_at: Instant::now(),
        }
    }

    /// Increases with every refresh
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Nodes in the order the cluster reported them
    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn taken_at(&self) -> Instant {
        self.taken_at
    }

    pub fn age(&self) -> Duration {
        self.taken_at.elapsed()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_by_id(&self, id: &NodeId) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }
}

/// Provides the client's view of the cluster.
///
/// Reads are lock-free and serve the cached snapshot. A refresh builds a
/// new snapshot and swaps it in; readers holding the previous one keep it
/// alive until they drop it.
pub struct TopologyProvider {
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
    current: ArcSwapOption<TopologySnapshot>,
    refresh_lock: tokio::sync::Mutex<()>,
    version: AtomicU64,
}

impl TopologyProvider {
    pub fn new(transport: Arc<dyn Transport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
            current: ArcSwapOption::empty(),
            refresh_lock: tokio::sync::Mutex::new(()),
            version: AtomicU64::new(0),
        }
    }

    /// Known cluster nodes.
    ///
    /// Serves the cached snapshot; fetches one first if none exists yet.
    pub async fn get_cluster_nodes(&self) -> Result<Vec<ClusterNode>> {
        if self.transport.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        if let Some(snapshot) = self.current.load_full() {
            return Ok(snapshot.nodes().to_vec());
        }

        let _guard = self.refresh_lock.lock().await;
        // another reader may have fetched while we waited
        if let Some(snapshot) = self.current.load_full() {
            return Ok(snapshot.nodes().to_vec());
        }
        Ok(self.fetch().await?.nodes().to_vec())
    }

    /// Fetch the member list from any reachable node and publish it.
    ///
    /// Concurrent refreshes run one at a time.
    pub async fn refresh(&self) -> Result<Arc<TopologySnapshot>> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch().await
    }

    /// Caller holds `refresh_lock`
    async fn fetch(&self) -> Result<Arc<TopologySnapshot>> {
        let response = self
            .transport
            .request_any(RpcRequest::ClusterNodes, self.request_timeout)
            .await?;

        let descriptors = match response {
            RpcResponse::ClusterNodes(descriptors) => descriptors,
            other => {
                return Err(Error::Protocol(format!(
                    "Unexpected response to cluster_nodes: {:?}",
                    other
                )))
            }
        };

        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let node = ClusterNode::try_from(descriptor)?;
            if !seen.insert(node.id().clone()) {
                warn!(node = %node, "Duplicate node id in member list, ignoring");
                continue;
            }
            nodes.push(node);
        }

        if nodes.is_empty() {
            warn!("Cluster reported no members");
        }

        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(TopologySnapshot::new(version, nodes));
        self.current.store(Some(snapshot.clone()));

        // the transport closes before the cache is invalidated, so a store
        // racing a shutdown is undone here
        if self.transport.is_closed() {
            self.current.store(None);
            debug!(version, "Transport closed during refresh, snapshot discarded");
            return Err(Error::ConnectionClosed);
        }

        info!(version, nodes = snapshot.len(), "Topology refreshed");
        Ok(snapshot)
    }

    /// Current snapshot, if one was taken
    pub fn snapshot(&self) -> Option<Arc<TopologySnapshot>> {
        self.current.load_full()
    }

    /// Drop the cached snapshot
    pub fn invalidate(&self) {
        if self.current.swap(None).is_some() {
            debug!("Topology snapshot invalidated");
        }
    }

    /// Look a node up by id in the cached snapshot
    pub fn node_by_id(&self, id: &NodeId) -> Option<ClusterNode> {
        let snapshot = self.current.load_full()?;
        snapshot.node_by_id(id).cloned()
    }

    /// Look a node up by name in the cached snapshot
    pub fn node_by_name(&self, name: &str) -> Option<ClusterNode> {
        let snapshot = self.current.load_full()?;
        snapshot.node_by_name(name).cloned()
    }
}

impl std::fmt::Debug for TopologyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyProvider")
            .field("version", &self.version.load(Ordering::SeqCst))
            .field("cached", &self.current.load().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_rpc::NodeDescriptor;
    use flint_testing::{node_descriptors, RecordingTransport};
    use parking_lot::Mutex;

    fn provider(transport: Arc<RecordingTransport>) -> TopologyProvider {
        TopologyProvider::new(transport, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_first_read_fetches_then_serves_cache() {
        let transport = Arc::new(RecordingTransport::cluster(node_descriptors("10.0.0.1", 3344, 2)));
        let topology = provider(transport.clone());
        assert!(topology.snapshot().is_none());

        let nodes = topology.get_cluster_nodes().await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].port(), 3344);
        assert_eq!(nodes[0].host(), nodes[1].host());

        topology.get_cluster_nodes().await.unwrap();
        assert_eq!(transport.call_count(), 1);
        assert_eq!(topology.snapshot().unwrap().version(), 1);
    }

    #[tokio::test]
    async fn test_refresh_swaps_snapshot() {
        let members = Arc::new(Mutex::new(node_descriptors("10.0.0.1", 3344, 1)));
        let reported = members.clone();
        let transport = Arc::new(RecordingTransport::new(move |_, _| {
            Ok(RpcResponse::ClusterNodes(reported.lock().clone()))
        }));
        let topology = provider(transport);

        let first = topology.refresh().await.unwrap();
        *members.lock() = node_descriptors("10.0.0.1", 3344, 3);
        let second = topology.refresh().await.unwrap();

        // readers of the old snapshot are unaffected
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 3);
        assert!(second.version() > first.version());
        assert_eq!(topology.get_cluster_nodes().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_lookup_and_invalidate() {
        let transport = Arc::new(RecordingTransport::cluster(node_descriptors("10.0.0.1", 3344, 2)));
        let topology = provider(transport.clone());
        topology.refresh().await.unwrap();

        let node = topology.node_by_name("flint_node_runner_1").unwrap();
        assert_eq!(node.port(), 3345);
        assert_eq!(topology.node_by_id(node.id()), Some(node));
        assert!(topology.node_by_name("missing").is_none());

        topology.invalidate();
        assert!(topology.snapshot().is_none());
        assert!(topology.node_by_name("flint_node_runner_1").is_none());

        // next read fetches again
        topology.get_cluster_nodes().await.unwrap();
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_snapshot() {
        let fail = Arc::new(Mutex::new(false));
        let failing = fail.clone();
        let transport = Arc::new(RecordingTransport::new(move |_, _| {
            if *failing.lock() {
                Err(Error::connection("node went away"))
            } else {
                Ok(RpcResponse::ClusterNodes(node_descriptors("10.0.0.1", 3344, 2)))
            }
        }));
        let topology = provider(transport);
        topology.refresh().await.unwrap();

        *fail.lock() = true;
        assert!(matches!(topology.refresh().await, Err(Error::Connection { .. })));
        assert_eq!(topology.snapshot().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_initial_fetch_failure() {
        let transport = Arc::new(RecordingTransport::new(|_, _| {
            Err(Error::connection("unreachable"))
        }));
        let topology = provider(transport);
        assert!(matches!(
            topology.get_cluster_nodes().await,
            Err(Error::Connection { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_descriptor_and_duplicates() {
        let transport = Arc::new(RecordingTransport::new(|_, _| {
            let mut members = node_descriptors("10.0.0.1", 3344, 2);
            members.push(members[0].clone());
            Ok(RpcResponse::ClusterNodes(members))
        }));
        let topology = provider(transport);
        assert_eq!(topology.refresh().await.unwrap().len(), 2);

        let transport = Arc::new(RecordingTransport::new(|_, _| {
            Ok(RpcResponse::ClusterNodes(vec![NodeDescriptor {
                id: String::new(),
                name: "nameless".to_string(),
                host: "10.0.0.1".to_string(),
                port: 3344,
            }]))
        }));
        let topology = provider(transport);
        assert!(matches!(topology.refresh().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let transport = Arc::new(RecordingTransport::cluster(node_descriptors("10.0.0.1", 3344, 1)));
        let topology = provider(transport.clone());
        topology.refresh().await.unwrap();

        transport.close().await;
        assert_eq!(
            topology.get_cluster_nodes().await.unwrap_err(),
            Error::ConnectionClosed
        );
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_fetch_once() {
        let transport = Arc::new(
            RecordingTransport::cluster(node_descriptors("10.0.0.1", 3344, 2))
                .with_latency(Duration::from_millis(100)),
        );
        let topology = provider(transport.clone());

        let (a, b) = tokio::join!(topology.get_cluster_nodes(), topology.get_cluster_nodes());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_finishing_after_close_is_discarded() {
        let transport = Arc::new(
            RecordingTransport::cluster(node_descriptors("10.0.0.1", 3344, 1))
                .with_latency(Duration::from_millis(200)),
        );
        let topology = Arc::new(provider(transport.clone()));

        let in_flight = {
            let topology = topology.clone();
            tokio::spawn(async move { topology.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        transport.close().await;
        topology.invalidate();

        assert_eq!(in_flight.await.unwrap().unwrap_err(), Error::ConnectionClosed);
        assert!(topology.snapshot().is_none());
    }
}
