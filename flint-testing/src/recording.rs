//! Transport double that records requests and answers from a script

use async_trait::async_trait;
use flint_core::{Error, Result};
use flint_net::Address;
use flint_rpc::{NodeDescriptor, RpcRequest, RpcResponse, Transport, Value};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

type Responder = dyn Fn(Option<&Address>, &RpcRequest) -> Result<RpcResponse> + Send + Sync;

/// One request seen by a [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// `None` for [`Transport::request_any`]
    pub address: Option<Address>,
    pub request: RpcRequest,
    pub timeout: Duration,
}

/// [`Transport`] that never touches the network.
///
/// Every request is recorded and answered by a responder closure.
/// An optional latency longer than the request timeout produces
/// [`Error::Timeout`].
pub struct RecordingTransport {
    responder: Box<Responder>,
    latency: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(Option<&Address>, &RpcRequest) -> Result<RpcResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            latency: None,
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Answers `ClusterNodes` with `members` and every job with the id of
    /// the node it was addressed to, as a string
    pub fn cluster(members: Vec<NodeDescriptor>) -> Self {
        Self::new(move |_, request| match request {
            RpcRequest::ClusterNodes => Ok(RpcResponse::ClusterNodes(members.clone())),
            RpcRequest::ExecuteJob { node_id, .. } => {
                Ok(RpcResponse::JobResult(Some(Value::String(node_id.clone()))))
            }
        })
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Addresses of all addressed requests, in call order
    pub fn destinations(&self) -> Vec<Address> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| call.address.clone())
            .collect()
    }

    async fn answer(
        &self,
        address: Option<&Address>,
        request: RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        self.calls.lock().push(RecordedCall {
            address: address.cloned(),
            request: request.clone(),
            timeout,
        });

        if let Some(latency) = self.latency {
            if latency > timeout {
                tokio::time::sleep(timeout).await;
                return Err(Error::Timeout);
            }
            tokio::time::sleep(latency).await;
        }

        (self.responder)(address, &request)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn request(
        &self,
        address: &Address,
        request: RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse> {
        self.answer(Some(address), request, timeout).await
    }

    async fn request_any(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse> {
        self.answer(None, request, timeout).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Descriptors for `count` nodes on consecutive ports of one host
pub fn node_descriptors(host: &str, first_port: u16, count: u16) -> Vec<NodeDescriptor> {
    (0..count)
        .map(|i| NodeDescriptor {
            id: format!("node-id-{}", i),
            name: format!("{}_{}", crate::jobs::NODE_RUNNER_PREFIX, i),
            host: host.to_string(),
            port: first_port + i,
        })
        .collect()
}
