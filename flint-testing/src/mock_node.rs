//! In-process cluster node speaking the Flint wire protocol

use crate::jobs::{JobContext, JobRegistry};
use flint_core::Result;
use flint_net::Address;
use flint_rpc::{
    NodeDescriptor, RequestId, RpcError, RpcMessageType, RpcRequest, RpcResponse, WireProtocol,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State shared by all nodes of one mock cluster
pub(crate) struct ClusterState {
    pub members: RwLock<Vec<NodeDescriptor>>,
    pub jobs: JobRegistry,
    pub wire: WireProtocol,
}

struct NodeInner {
    descriptor: NodeDescriptor,
    cluster: Arc<ClusterState>,
    executions: AtomicU64,
    cancellations: AtomicU64,
    connections: Mutex<Vec<JoinHandle<()>>>,
}

/// A mock node accepting client connections.
///
/// Every connection is served by its own task; jobs run concurrently and
/// can be cancelled by the client. Dropping the node stops it.
pub struct MockNode {
    inner: Arc<NodeInner>,
    address: Address,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl MockNode {
    /// Start serving on an already bound listener
    pub(crate) fn start(
        listener: TcpListener,
        descriptor: NodeDescriptor,
        cluster: Arc<ClusterState>,
    ) -> Result<Self> {
        let address = Address::new(descriptor.host.clone(), descriptor.port)?;
        let inner = Arc::new(NodeInner {
            descriptor,
            cluster,
            executions: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
            connections: Mutex::new(Vec::new()),
        });

        let accept_task = tokio::spawn(accept_loop(listener, inner.clone()));
        info!(node = %inner.descriptor.name, %address, "Mock node listening");

        Ok(Self {
            inner,
            address,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.inner.descriptor.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.inner.descriptor
    }

    /// Number of jobs this node has started
    pub fn executions(&self) -> u64 {
        self.inner.executions.load(Ordering::SeqCst)
    }

    /// Number of running jobs cancelled by a client
    pub fn cancellations(&self) -> u64 {
        self.inner.cancellations.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.accept_task.lock().is_some()
    }

    /// Stop accepting and drop every client connection.
    ///
    /// Returns once the listening socket is closed.
    pub async fn shutdown(&self) {
        let Some(accept_task) = self.accept_task.lock().take() else {
            return;
        };
        let connections: Vec<JoinHandle<()>> = self.inner.connections.lock().drain(..).collect();

        accept_task.abort();
        let _ = accept_task.await;
        for connection in connections {
            connection.abort();
            let _ = connection.await;
        }
        info!(node = %self.inner.descriptor.name, "Mock node stopped");
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
        for connection in self.inner.connections.lock().drain(..) {
            connection.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, node: Arc<NodeInner>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(node = %node.descriptor.name, %peer, "Accepted connection");
                let task = tokio::spawn(handle_connection(stream, node.clone()));
                let mut connections = node.connections.lock();
                connections.retain(|c| !c.is_finished());
                connections.push(task);
            }
            Err(e) => {
                warn!(node = %node.descriptor.name, "Accept failed: {}", e);
                break;
            }
        }
    }
}

type RunningJobs = Arc<Mutex<HashMap<RequestId, JoinHandle<()>>>>;

/// Aborts the writer and all running jobs when the connection task ends
struct ConnectionTasks {
    writer: JoinHandle<()>,
    running: RunningJobs,
}

impl Drop for ConnectionTasks {
    fn drop(&mut self) {
        self.writer.abort();
        for (_, job) in self.running.lock().drain() {
            job.abort();
        }
    }
}

async fn handle_connection(stream: TcpStream, node: Arc<NodeInner>) {
    let (mut reader, mut writer) = stream.into_split();
    let wire = node.cluster.wire.clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<RpcMessageType>();

    let writer_wire = wire.clone();
    let tasks = ConnectionTasks {
        writer: tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = writer_wire.write_message(&mut writer, &message).await {
                    debug!("Failed to send response: {}", e);
                    break;
                }
            }
        }),
        running: Arc::new(Mutex::new(HashMap::new())),
    };

    loop {
        match wire.read_message(&mut reader).await {
            Ok(Some(message)) => handle_message(message, &node, &tx, &tasks.running),
            Ok(None) => break,
            Err(e) => {
                warn!(node = %node.descriptor.name, "Dropping connection: {}", e);
                break;
            }
        }
    }

    debug!(node = %node.descriptor.name, "Connection handler finished");
}

fn handle_message(
    message: RpcMessageType,
    node: &Arc<NodeInner>,
    tx: &mpsc::UnboundedSender<RpcMessageType>,
    running: &RunningJobs,
) {
    match message {
        RpcMessageType::Request { id, request } => match request {
            RpcRequest::ClusterNodes => {
                let members = node.cluster.members.read().clone();
                let _ = tx.send(RpcMessageType::Response {
                    id,
                    response: RpcResponse::ClusterNodes(members),
                });
            }
            RpcRequest::ExecuteJob {
                node_id,
                job_name,
                args,
            } => start_job(id, node_id, job_name, args, node, tx, running),
        },

        RpcMessageType::Cancel { id } => {
            if let Some(job) = running.lock().remove(&id) {
                job.abort();
                node.cancellations.fetch_add(1, Ordering::SeqCst);
                debug!(node = %node.descriptor.name, id, "Job cancelled");
            }
        }

        RpcMessageType::Heartbeat { timestamp } => {
            let _ = tx.send(RpcMessageType::Heartbeat { timestamp });
        }

        other => {
            warn!(node = %node.descriptor.name, "Unexpected message from client: {:?}", other);
        }
    }
}

fn start_job(
    id: RequestId,
    node_id: String,
    job_name: String,
    args: Vec<flint_rpc::Value>,
    node: &Arc<NodeInner>,
    tx: &mpsc::UnboundedSender<RpcMessageType>,
    running: &RunningJobs,
) {
    let reply_error = |error: RpcError| {
        let _ = tx.send(RpcMessageType::Error {
            id,
            code: error.code,
            message: error.message,
        });
    };

    if node_id != node.descriptor.id {
        reply_error(RpcError::node_mismatch(&node_id, &node.descriptor.id));
        return;
    }

    let ctx = JobContext {
        node_id: node.descriptor.id.clone(),
        node_name: node.descriptor.name.clone(),
    };
    let Some(job) = node.cluster.jobs.run(&job_name, ctx, args) else {
        reply_error(RpcError::job_not_found(&job_name));
        return;
    };

    node.executions.fetch_add(1, Ordering::SeqCst);
    debug!(node = %node.descriptor.name, id, job = %job_name, "Running job");

    // held across spawn so the job cannot deregister before it is registered
    let mut jobs = running.lock();
    let tx = tx.clone();
    let registry = running.clone();
    let handle = tokio::spawn(async move {
        let reply = match job.await {
            Ok(value) => RpcMessageType::Response {
                id,
                response: RpcResponse::JobResult(value),
            },
            Err(message) => {
                let error = RpcError::job_failed(&message);
                RpcMessageType::Error {
                    id,
                    code: error.code,
                    message: error.message,
                }
            }
        };
        registry.lock().remove(&id);
        let _ = tx.send(reply);
    });
    jobs.insert(id, handle);
}
