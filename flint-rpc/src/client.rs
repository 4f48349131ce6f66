//! Multiplexed RPC connection to a single cluster node

use crate::codec::WireProtocol;
use crate::protocol::{
    generate_request_id, timestamp_millis, RequestId, RpcError, RpcMessageType, RpcRequest,
    RpcResponse,
};
use bytes::Bytes;
use flint_core::{Error, Result};
use flint_net::Address;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

type PendingMap = Arc<Mutex<HashMap<RequestId, PendingRequest>>>;

/// Pending RPC request
struct PendingRequest {
    /// Response sender
    response_sender: oneshot::Sender<Result<RpcResponse>>,
    /// Operation name, for diagnostics
    operation: &'static str,
    /// Request timestamp
    timestamp: Instant,
}

/// Per-connection settings
#[derive(Debug, Clone)]
pub struct RpcConnectionConfig {
    /// Time allowed for the TCP handshake
    pub connect_timeout: Duration,
    /// Interval between heartbeat frames, if enabled
    pub heartbeat_interval: Option<Duration>,
}

impl Default for RpcConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: None,
        }
    }
}

/// Removes a pending entry when the waiting call finishes or is dropped
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// State shared between a connection and its background tasks
struct Shared {
    address: Address,
    pending: PendingMap,
    /// Cleared when the stream breaks or the connection is closed
    alive: AtomicBool,
}

impl Shared {
    fn mark_broken(&self, reason: &str) {
        self.alive.store(false, Ordering::SeqCst);
        info!(address = %self.address, %reason, "Connection lost");

        fail_pending(&self.pending, || {
            Error::connection(format!("Connection to {} lost: {}", self.address, reason))
        });
    }
}

/// A TCP connection to one node carrying many concurrent requests.
///
/// Requests are correlated with responses by [`RequestId`]; a background
/// task reads frames and completes the matching waiter. Outgoing frames are
/// queued to a single writer task, so a caller giving up never leaves a
/// partial frame on the stream.
pub struct RpcConnection {
    shared: Arc<Shared>,
    wire: WireProtocol,
    outbound: mpsc::UnboundedSender<Bytes>,
    /// Set by [`RpcConnection::close`]
    closed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RpcConnection {
    /// Open a connection to `address`, bounded by the configured connect timeout
    pub async fn connect(
        address: &Address,
        wire: WireProtocol,
        config: &RpcConnectionConfig,
    ) -> Result<Arc<Self>> {
        info!(%address, "Connecting to node");

        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(address.to_connect_string()),
        )
        .await
        .map_err(|_| {
            Error::connection(format!(
                "Timed out connecting to {} after {:?}",
                address, config.connect_timeout
            ))
        })?
        .map_err(|e| Error::connection(format!("Failed to connect to {}: {}", address, e)))?;

        stream.set_nodelay(true)?;

        Ok(Self::from_stream(address.clone(), stream, wire, config))
    }

    /// Wrap an already established stream
    pub fn from_stream(
        address: Address,
        stream: TcpStream,
        wire: WireProtocol,
        config: &RpcConnectionConfig,
    ) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let shared = Arc::new(Shared {
            address: address.clone(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            alive: AtomicBool::new(true),
        });
        let (outbound, frames) = mpsc::unbounded_channel();

        let mut tasks = vec![
            tokio::spawn(response_loop(read_half, wire.clone(), shared.clone())),
            tokio::spawn(write_loop(write_half, frames, shared.clone())),
        ];

        if let Some(interval) = config.heartbeat_interval {
            tasks.push(tokio::spawn(heartbeat_loop(
                outbound.clone(),
                wire.clone(),
                shared.clone(),
                interval,
            )));
        }

        info!(%address, "Connected to node");

        Arc::new(Self {
            shared,
            wire,
            outbound,
            closed: AtomicBool::new(false),
            tasks: Mutex::new(tasks),
        })
    }

    /// Address of the remote node
    pub fn address(&self) -> &Address {
        &self.shared.address
    }

    /// Check if the connection can carry new requests
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.shared.alive.load(Ordering::SeqCst)
    }

    /// Check if [`RpcConnection::close`] was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Get pending request count
    pub fn pending_request_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Send a request and wait for the correlated response.
    ///
    /// The timeout bounds the wait for the response. On timeout the pending
    /// entry is dropped and a best-effort cancel frame is queued; other
    /// requests on this connection are unaffected.
    pub async fn call(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse> {
        let id = generate_request_id();
        let operation = request.operation();
        let frame = self
            .wire
            .encode_for_wire(&RpcMessageType::Request { id, request })?;
        let (response_sender, response_receiver) = oneshot::channel();

        self.shared.pending.lock().insert(
            id,
            PendingRequest {
                response_sender,
                operation,
                timestamp: Instant::now(),
            },
        );
        let _guard = PendingGuard {
            pending: &self.shared.pending,
            id,
        };

        // checked after registering: a concurrent drain has either failed
        // this entry already or left `alive` cleared for us to see
        self.ensure_open()?;

        self.enqueue(frame)?;
        debug!(request_id = id, operation, address = %self.address(), "Sent request");

        match tokio::time::timeout(timeout, response_receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::connection(format!(
                "Connection to {} dropped request {}",
                self.address(),
                id
            ))),
            Err(_) => {
                warn!(request_id = id, operation, address = %self.address(), ?timeout, "Request timed out");
                self.cancel_remote(id);
                Err(Error::Timeout)
            }
        }
    }

    /// Close the connection. Pending requests fail with [`Error::ConnectionClosed`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.alive.store(false, Ordering::SeqCst);

        fail_pending(&self.shared.pending, || Error::ConnectionClosed);

        // dropping the write half shuts the socket down, even mid-frame
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
            let _ = task.await;
        }

        info!(address = %self.address(), "Disconnected from node");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        if !self.shared.alive.load(Ordering::SeqCst) {
            return Err(Error::connection(format!(
                "Connection to {} is broken",
                self.address()
            )));
        }
        Ok(())
    }

    fn enqueue(&self, frame: Bytes) -> Result<()> {
        self.outbound.send(frame).map_err(|_| {
            Error::connection(format!("Writer for {} has stopped", self.address()))
        })
    }

    fn cancel_remote(&self, id: RequestId) {
        if !self.is_open() {
            return;
        }

        let sent = self
            .wire
            .encode_for_wire(&RpcMessageType::Cancel { id })
            .and_then(|frame| self.enqueue(frame));
        match sent {
            Ok(()) => debug!(request_id = id, address = %self.address(), "Queued cancel"),
            Err(e) => debug!(request_id = id, address = %self.address(), "Failed to queue cancel: {}", e),
        }
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("address", self.address())
            .field("open", &self.is_open())
            .field("pending", &self.pending_request_count())
            .finish()
    }
}

fn fail_pending(pending: &PendingMap, error: impl Fn() -> Error) {
    let drained: Vec<(RequestId, PendingRequest)> = pending.lock().drain().collect();
    for (id, request) in drained {
        debug!(
            request_id = id,
            operation = request.operation,
            elapsed = ?request.timestamp.elapsed(),
            "Failing pending request"
        );
        let _ = request.response_sender.send(Err(error()));
    }
}

/// Reads frames until the stream ends and completes matching waiters
async fn response_loop(read_half: OwnedReadHalf, wire: WireProtocol, shared: Arc<Shared>) {
    let mut reader = BufReader::new(read_half);

    let reason = loop {
        match wire.read_message(&mut reader).await {
            Ok(Some(message)) => handle_response_message(&shared, message),
            Ok(None) => break "closed by peer".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    shared.mark_broken(&reason);
}

/// Writes queued frames one at a time, each in full
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::UnboundedReceiver<Bytes>,
    shared: Arc<Shared>,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            shared.mark_broken(&format!("write failed: {}", e));
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(address = %shared.address, "Error shutting down connection: {}", e);
    }
}

fn handle_response_message(shared: &Shared, message: RpcMessageType) {
    let address = &shared.address;
    match message {
        RpcMessageType::Response { id, response } => {
            trace!(request_id = id, %address, "Received response");
            match shared.pending.lock().remove(&id) {
                Some(request) => {
                    let _ = request.response_sender.send(Ok(response));
                }
                None => debug!(request_id = id, "Received response for unknown request"),
            }
        }

        RpcMessageType::Error { id, code, message } => {
            debug!(request_id = id, %code, %message, "Received error response");
            match shared.pending.lock().remove(&id) {
                Some(request) => {
                    let error = RpcError::new(code, message);
                    let _ = request.response_sender.send(Err(error.into()));
                }
                None => debug!(request_id = id, "Received error for unknown request"),
            }
        }

        RpcMessageType::Heartbeat { timestamp } => {
            trace!(%address, timestamp, "Received heartbeat");
        }

        other => {
            warn!(%address, ?other, "Unexpected message type received by client");
        }
    }
}

async fn heartbeat_loop(
    outbound: mpsc::UnboundedSender<Bytes>,
    wire: WireProtocol,
    shared: Arc<Shared>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // first tick completes immediately
    ticker.tick().await;

    while shared.alive.load(Ordering::SeqCst) {
        ticker.tick().await;

        let message = RpcMessageType::Heartbeat {
            timestamp: timestamp_millis(),
        };
        let queued = wire
            .encode_for_wire(&message)
            .map(|frame| outbound.send(frame).is_ok());
        match queued {
            Ok(true) => trace!(address = %shared.address, "Queued heartbeat"),
            Ok(false) => break,
            Err(e) => {
                debug!("Heartbeat failed: {}", e);
                break;
            }
        }
    }
}
