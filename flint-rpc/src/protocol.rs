//! RPC protocol definitions

use crate::value::Value;
use flint_core::Error;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation id linking a request to its response
pub type RequestId = u64;

/// Global request ID counter
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique request ID
pub fn generate_request_id() -> RequestId {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Node description as reported by a cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// Operations a client can ask a node to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcRequest {
    /// List the members of the cluster as known by the receiving node
    ClusterNodes,

    /// Run a named job on the node identified by `node_id`
    ExecuteJob {
        node_id: String,
        job_name: String,
        args: Vec<Value>,
    },
}

impl RpcRequest {
    /// Short operation name used in logs
    pub fn operation(&self) -> &'static str {
        match self {
            RpcRequest::ClusterNodes => "cluster_nodes",
            RpcRequest::ExecuteJob { .. } => "execute_job",
        }
    }
}

/// Successful response payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcResponse {
    ClusterNodes(Vec<NodeDescriptor>),
    /// `None` when the job completed without producing a value
    JobResult(Option<Value>),
}

/// RPC message type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcMessageType {
    /// Request message
    Request { id: RequestId, request: RpcRequest },

    /// Response message - success
    Response { id: RequestId, response: RpcResponse },

    /// Response message - error
    Error {
        id: RequestId,
        code: RpcErrorCode,
        message: String,
    },

    /// Best-effort cancellation of an in-flight request
    Cancel { id: RequestId },

    /// Heartbeat for connection monitoring
    Heartbeat { timestamp: u64 },
}

/// RPC error codes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RpcErrorCode {
    /// The job ran and failed
    JobFailed,
    /// No job registered under the requested name
    JobNotFound,
    /// The request was addressed to a different node
    NodeMismatch,
}

impl RpcErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            RpcErrorCode::JobFailed => 100,
            RpcErrorCode::JobNotFound => 101,
            RpcErrorCode::NodeMismatch => 102,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RpcErrorCode::JobFailed => "Job failed",
            RpcErrorCode::JobNotFound => "Job not found",
            RpcErrorCode::NodeMismatch => "Node mismatch",
        }
    }
}

impl std::fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// Error reported by a node in reply to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn job_failed(message: &str) -> Self {
        Self::new(RpcErrorCode::JobFailed, message)
    }

    pub fn job_not_found(job_name: &str) -> Self {
        Self::new(
            RpcErrorCode::JobNotFound,
            format!("Job '{}' not found", job_name),
        )
    }

    pub fn node_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            RpcErrorCode::NodeMismatch,
            format!("Request for node '{}' reached node '{}'", expected, actual),
        )
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<RpcError> for Error {
    fn from(err: RpcError) -> Self {
        match err.code {
            // the job itself misbehaved or does not exist on the server
            RpcErrorCode::JobFailed | RpcErrorCode::JobNotFound => {
                Error::JobExecution(err.message)
            }
            RpcErrorCode::NodeMismatch => Error::Protocol(err.to_string()),
        }
    }
}

/// Current wall clock time in milliseconds, used for heartbeats
pub fn timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
