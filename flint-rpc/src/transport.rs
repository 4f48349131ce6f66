//! Transport abstraction used by the topology and compute layers

use crate::protocol::{RpcRequest, RpcResponse};
use async_trait::async_trait;
use flint_core::Result;
use flint_net::Address;
use std::time::Duration;

/// Reliable request/response channel to cluster nodes.
///
/// Implementations must suspend the calling task, not a thread, while a
/// request is in flight. `timeout` bounds the whole request: a node not
/// reached in time fails with [`flint_core::Error::Connection`], a response
/// not received in time with [`flint_core::Error::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request to the node listening on `address`
    async fn request(
        &self,
        address: &Address,
        request: RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse>;

    /// Send a request to any reachable node
    async fn request_any(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse>;

    /// Release all connections. In-flight requests fail with
    /// [`flint_core::Error::ConnectionClosed`].
    async fn close(&self);

    /// Check if [`Transport::close`] has been called
    fn is_closed(&self) -> bool;
}
