//! Client entry point

use crate::compute::Compute;
use crate::node::ClusterNode;
use crate::topology::TopologyProvider;
use flint_config::{init_logging, validate_config, ClientConfig};
use flint_core::{Error, Result};
use flint_net::Address;
use flint_rpc::{
    ChannelConfig, ClusterChannel, RpcCodec, RpcConnectionConfig, SerializationFormat, Transport,
    WireProtocol,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Connected Flint client.
///
/// Owns the connections to the cluster; every [`Compute`] handed out stops
/// working once [`Client::shutdown`] has been called.
pub struct Client {
    config: ClientConfig,
    channel: Arc<ClusterChannel>,
    topology: TopologyProvider,
    compute: Compute,
}

impl Client {
    /// Connect to the configured nodes and load the cluster topology.
    ///
    /// Succeeds when at least one node is reachable. The whole startup is
    /// bounded by `connect_timeout`.
    pub async fn start(config: ClientConfig, connect_timeout: Duration) -> Result<Self> {
        validate_config(&config)?;

        if let Some(logging) = &config.logging {
            if !init_logging(logging)? {
                warn!("A global tracing subscriber is already installed, keeping it");
            }
        }

        let format: SerializationFormat = config.serialization.parse()?;
        let codec = RpcCodec::with_format(format)
            .with_compression(config.compression)
            .with_max_size(config.max_message_size);

        let channel = Arc::new(ClusterChannel::new(
            ChannelConfig {
                seeds: config.node_addresses.clone(),
                connection: RpcConnectionConfig {
                    connect_timeout: config.connect_timeout(),
                    heartbeat_interval: config.heartbeat_interval(),
                },
            },
            WireProtocol::new(codec),
        ));
        let transport: Arc<dyn Transport> = channel.clone();
        let topology = TopologyProvider::new(transport.clone(), config.request_timeout());

        let startup = async {
            channel.connect_all().await?;
            topology.refresh().await
        };

        let snapshot = match tokio::time::timeout(connect_timeout, startup).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                channel.close().await;
                return Err(e);
            }
            Err(_) => {
                channel.close().await;
                return Err(Error::Timeout);
            }
        };

        info!(
            nodes = snapshot.len(),
            connected = channel.connected_addresses().len(),
            "Flint client started"
        );

        let compute = Compute::new(transport, config.request_timeout());
        Ok(Self {
            config,
            channel,
            topology,
            compute,
        })
    }

    /// Known cluster nodes, served from the cached topology
    pub async fn get_cluster_nodes(&self) -> Result<Vec<ClusterNode>> {
        self.topology.get_cluster_nodes().await
    }

    /// Re-fetch the member list from the cluster
    pub async fn refresh_topology(&self) -> Result<Vec<ClusterNode>> {
        if self.channel.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        Ok(self.topology.refresh().await?.nodes().to_vec())
    }

    pub fn compute(&self) -> &Compute {
        &self.compute
    }

    pub fn get_compute(&self) -> &Compute {
        self.compute()
    }

    pub fn topology(&self) -> &TopologyProvider {
        &self.topology
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Addresses with an open connection
    pub fn connected_addresses(&self) -> Vec<Address> {
        self.channel.connected_addresses()
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Close every connection. In-flight and later calls fail with
    /// [`Error::ConnectionClosed`].
    pub async fn shutdown(&self) {
        if self.channel.is_closed() {
            return;
        }
        self.channel.close().await;
        self.topology.invalidate();
        info!("Flint client stopped");
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("node_addresses", &self.config.node_addresses)
            .field("closed", &self.channel.is_closed())
            .finish()
    }
}
