//! Connections to every configured cluster node

use crate::client::{RpcConnection, RpcConnectionConfig};
use crate::codec::WireProtocol;
use crate::protocol::{RpcRequest, RpcResponse};
use crate::transport::Transport;
use async_trait::async_trait;
use dashmap::DashMap;
use flint_core::{Error, Result};
use flint_net::Address;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Addresses the client was configured with
    pub seeds: Vec<Address>,
    pub connection: RpcConnectionConfig,
}

/// [`Transport`] keeping one [`RpcConnection`] per node address.
///
/// Connections are opened eagerly by [`ClusterChannel::connect_all`] and
/// lazily for addresses learned later (for example from the topology).
/// A broken connection is replaced on the next request to that address.
pub struct ClusterChannel {
    config: ChannelConfig,
    wire: WireProtocol,
    connections: DashMap<Address, Arc<RpcConnection>>,
    closed: AtomicBool,
}

impl ClusterChannel {
    pub fn new(config: ChannelConfig, wire: WireProtocol) -> Self {
        Self {
            config,
            wire,
            connections: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Connect to all seed addresses concurrently.
    ///
    /// Succeeds when at least one connection is established. Returns the
    /// number of open connections.
    pub async fn connect_all(&self) -> Result<usize> {
        if self.config.seeds.is_empty() {
            return Err(Error::InvalidArgument(
                "No node addresses configured".to_string(),
            ));
        }

        let attempts = self.config.seeds.iter().map(|address| async move {
            (address, self.connection_to(address).await)
        });

        let mut connected = 0;
        let mut last_error = None;
        for (address, result) in join_all(attempts).await {
            match result {
                Ok(_) => connected += 1,
                Err(e) => {
                    warn!(%address, "Failed to connect to node: {}", e);
                    last_error = Some(e);
                }
            }
        }

        if connected == 0 {
            return Err(match last_error {
                Some(e) => Error::connection(format!("No cluster node is reachable: {}", e)),
                None => Error::connection("No cluster node is reachable"),
            });
        }

        info!(connected, configured = self.config.seeds.len(), "Connected to cluster");
        Ok(connected)
    }

    /// Addresses with an open connection
    pub fn connected_addresses(&self) -> Vec<Address> {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_open())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Get the open connection to `address`, connecting if needed
    async fn connection_to(&self, address: &Address) -> Result<Arc<RpcConnection>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        if let Some(existing) = self.connections.get(address).map(|entry| entry.value().clone()) {
            if existing.is_open() {
                return Ok(existing);
            }
            debug!(%address, "Replacing broken connection");
            self.connections
                .remove_if(address, |_, current| Arc::ptr_eq(current, &existing));
        }

        let connection =
            RpcConnection::connect(address, self.wire.clone(), &self.config.connection).await?;

        // another task may have connected concurrently; keep the first one
        let winner = self
            .connections
            .entry(address.clone())
            .or_insert_with(|| connection.clone())
            .value()
            .clone();

        if !Arc::ptr_eq(&winner, &connection) {
            connection.close().await;
        }

        // close() may have raced with this connect
        if self.closed.load(Ordering::SeqCst) {
            winner.close().await;
            return Err(Error::ConnectionClosed);
        }

        Ok(winner)
    }

    /// [`ClusterChannel::connection_to`] bounded by a caller's deadline
    async fn connection_within(
        &self,
        address: &Address,
        deadline: Instant,
    ) -> Result<Arc<RpcConnection>> {
        match tokio::time::timeout_at(deadline, self.connection_to(address)).await {
            Ok(result) => result,
            Err(_) => Err(Error::connection(format!(
                "Timed out connecting to {}",
                address
            ))),
        }
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    // far enough in the future to never elapse
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[async_trait]
impl Transport for ClusterChannel {
    async fn request(
        &self,
        address: &Address,
        request: RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse> {
        let deadline = deadline_after(timeout);
        let connection = self.connection_within(address, deadline).await?;
        connection.call(request, remaining(deadline)).await
    }

    async fn request_any(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        // prefer an already open connection, in seed order
        let open = self
            .config
            .seeds
            .iter()
            .filter_map(|address| self.connections.get(address).map(|e| e.value().clone()))
            .chain(self.connections.iter().map(|e| e.value().clone()))
            .find(|connection| connection.is_open());

        if let Some(connection) = open {
            return connection.call(request, timeout).await;
        }

        let deadline = deadline_after(timeout);
        let mut last_error = Error::connection("No cluster node is reachable");
        for address in &self.config.seeds {
            match self.connection_within(address, deadline).await {
                Ok(connection) => return connection.call(request, remaining(deadline)).await,
                Err(Error::ConnectionClosed) => return Err(Error::ConnectionClosed),
                Err(e) => {
                    debug!(%address, "Seed unavailable: {}", e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let connections: Vec<Arc<RpcConnection>> =
            self.connections.iter().map(|e| e.value().clone()).collect();
        self.connections.clear();

        join_all(connections.iter().map(|connection| connection.close())).await;
        info!(closed = connections.len(), "Cluster channel closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
