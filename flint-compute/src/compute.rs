//! Job submission to cluster nodes

use crate::envelope::JobResult;
use crate::node::ClusterNode;
use crate::selection::{NodeSelector, RandomSelector};
use flint_core::{Error, Result};
use flint_rpc::{RpcRequest, RpcResponse, Transport, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A named job with its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    name: String,
    args: Vec<Value>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append several arguments
    pub fn args(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(values);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.args
    }
}

/// Where a job may run
#[derive(Debug, Clone, PartialEq)]
pub enum JobTarget {
    /// Exactly this node
    Node(ClusterNode),
    /// Any one of these nodes
    AnyNode(Vec<ClusterNode>),
}

impl JobTarget {
    pub fn node(node: ClusterNode) -> Self {
        JobTarget::Node(node)
    }

    /// Fails with [`Error::InvalidArgument`] when `nodes` is empty
    pub fn any_node(nodes: impl Into<Vec<ClusterNode>>) -> Result<Self> {
        let nodes = nodes.into();
        if nodes.is_empty() {
            return Err(Error::InvalidArgument(
                "Job target needs at least one node".to_string(),
            ));
        }
        Ok(JobTarget::AnyNode(nodes))
    }

    /// Candidate nodes
    pub fn nodes(&self) -> &[ClusterNode] {
        match self {
            JobTarget::Node(node) => std::slice::from_ref(node),
            JobTarget::AnyNode(nodes) => nodes,
        }
    }
}

/// Lifecycle of one job invocation, reported in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Submitted,
    Completed,
    TimedOut,
    TransportFailed,
    JobFailed,
}

impl JobState {
    /// Terminal state for a failed invocation
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Timeout => JobState::TimedOut,
            Error::Connection { .. } | Error::ConnectionClosed | Error::Io(_) => {
                JobState::TransportFailed
            }
            _ => JobState::JobFailed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Created | JobState::Submitted)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Created => "created",
            JobState::Submitted => "submitted",
            JobState::Completed => "completed",
            JobState::TimedOut => "timed_out",
            JobState::TransportFailed => "transport_failed",
            JobState::JobFailed => "job_failed",
        };
        f.write_str(name)
    }
}

/// Runs jobs on cluster nodes.
///
/// Each call picks one node with the configured [`NodeSelector`] and sends
/// a single request; failures are returned, never retried.
#[derive(Clone)]
pub struct Compute {
    transport: Arc<dyn Transport>,
    selector: Arc<dyn NodeSelector>,
    default_timeout: Duration,
}

impl Compute {
    /// Executor choosing nodes uniformly at random
    pub fn new(transport: Arc<dyn Transport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            selector: Arc::new(RandomSelector),
            default_timeout,
        }
    }

    /// Replace the node selection strategy
    pub fn with_selector(mut self, selector: Arc<dyn NodeSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run `job_name` on one of `nodes` with the default timeout
    pub async fn execute(
        &self,
        nodes: &[ClusterNode],
        job_name: &str,
        args: Vec<Value>,
    ) -> Result<JobResult> {
        self.execute_with_timeout(nodes, job_name, args, self.default_timeout)
            .await
    }

    /// Run `job_name` on one of `nodes`
    pub async fn execute_with_timeout(
        &self,
        nodes: &[ClusterNode],
        job_name: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<JobResult> {
        if self.transport.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let target = JobTarget::any_node(nodes)?;
        self.submit(target, Job::new(job_name).args(args), timeout)
            .await
    }

    /// Run `job` on a node of `target`.
    ///
    /// Arguments are checked before anything is sent: an empty target or
    /// job name fails with [`Error::InvalidArgument`].
    pub async fn submit(&self, target: JobTarget, job: Job, timeout: Duration) -> Result<JobResult> {
        if self.transport.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        if target.nodes().is_empty() {
            return Err(Error::InvalidArgument(
                "Job target needs at least one node".to_string(),
            ));
        }
        if job.name.trim().is_empty() {
            return Err(Error::InvalidArgument("Job name cannot be empty".to_string()));
        }
        if timeout.is_zero() {
            return Err(Error::InvalidArgument("Job timeout must be positive".to_string()));
        }

        let node = self
            .selector
            .select(target.nodes())
            .ok_or_else(|| Error::Internal("Node selector returned no node".to_string()))?
            .clone();

        debug!(
            job = %job.name,
            node = %node,
            candidates = target.nodes().len(),
            state = %JobState::Created,
            "Node selected"
        );

        let job_name = job.name;
        let request = RpcRequest::ExecuteJob {
            node_id: node.id().to_string(),
            job_name: job_name.clone(),
            args: job.args,
        };

        debug!(job = %job_name, node = %node, state = %JobState::Submitted, "Job submitted");
        let started = Instant::now();

        match self.transport.request(node.address(), request, timeout).await {
            Ok(RpcResponse::JobResult(value)) => {
                debug!(
                    job = %job_name,
                    node = %node,
                    state = %JobState::Completed,
                    has_value = value.is_some(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
                Ok(JobResult::new(value))
            }
            Ok(other) => Err(Error::Protocol(format!(
                "Unexpected response to execute_job: {:?}",
                other
            ))),
            Err(e) => {
                let error = e.with_node(node.id().as_str());
                warn!(
                    job = %job_name,
                    node = %node,
                    state = %JobState::from_error(&error),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job failed: {}",
                    error
                );
                Err(error)
            }
        }
    }
}

impl fmt::Debug for Compute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compute")
            .field("selector", &self.selector)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use crate::selection::{FirstNodeSelector, RoundRobinSelector};
    use flint_net::Address;
    use flint_rpc::RpcError;
    use flint_testing::{node_descriptors, RecordingTransport};

    fn nodes(count: u16) -> Vec<ClusterNode> {
        node_descriptors("10.0.0.1", 3344, count)
            .into_iter()
            .map(|d| ClusterNode::try_from(d).unwrap())
            .collect()
    }

    fn cluster_transport() -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport::cluster(node_descriptors("10.0.0.1", 3344, 3)))
    }

    #[tokio::test]
    async fn test_execute_selects_from_given_nodes() {
        let transport = cluster_transport();
        let compute = Compute::new(transport.clone(), Duration::from_secs(1));
        let candidates = nodes(3)[1..].to_vec();

        for _ in 0..50 {
            let result = compute.execute(&candidates, "JOB", Vec::new()).await.unwrap();
            let node_id = result.get::<String>().unwrap();
            // the request reached the node it was addressed to
            assert!(candidates.iter().any(|n| n.id().as_str() == node_id));
        }

        let allowed: Vec<&Address> = candidates.iter().map(ClusterNode::address).collect();
        let destinations = transport.destinations();
        assert_eq!(destinations.len(), 50);
        assert!(destinations.iter().all(|a| allowed.contains(&a)));
    }

    #[tokio::test]
    async fn test_empty_node_set_fails_before_network() {
        let transport = cluster_transport();
        let compute = Compute::new(transport.clone(), Duration::from_secs(1));

        let error = compute.execute(&[], "JOB", Vec::new()).await.unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));

        let error = compute
            .submit(JobTarget::AnyNode(Vec::new()), Job::new("JOB"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));

        let error = compute.execute(&nodes(1), "  ", Vec::new()).await.unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));

        assert_eq!(transport.call_count(), 0);
        assert!(JobTarget::any_node(Vec::<ClusterNode>::new()).is_err());
    }

    #[tokio::test]
    async fn test_request_carries_job_and_args() {
        let transport = cluster_transport();
        let compute = Compute::new(transport.clone(), Duration::from_secs(7))
            .with_selector(Arc::new(FirstNodeSelector));
        let candidates = nodes(2);

        let job = Job::new("ADD").arg(2i64).arg(40i64);
        compute
            .submit(JobTarget::any_node(candidates.clone()).unwrap(), job, compute.default_timeout())
            .await
            .unwrap();

        let calls = transport.calls();
        let call = &calls[0];
        assert_eq!(call.address.as_ref(), Some(candidates[0].address()));
        assert_eq!(call.timeout, Duration::from_secs(7));
        assert_eq!(
            call.request,
            RpcRequest::ExecuteJob {
                node_id: "node-id-0".to_string(),
                job_name: "ADD".to_string(),
                args: vec![Value::Int64(2), Value::Int64(40)],
            }
        );
    }

    #[tokio::test]
    async fn test_single_node_target() {
        let transport = cluster_transport();
        let compute = Compute::new(transport.clone(), Duration::from_secs(1))
            .with_selector(Arc::new(RoundRobinSelector::new()));
        let node = nodes(3).remove(2);

        for _ in 0..3 {
            let result = compute
                .submit(JobTarget::node(node.clone()), Job::new("JOB"), Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(result.get::<String>().unwrap(), node.id().as_str());
        }
    }

    #[tokio::test]
    async fn test_void_result() {
        let transport = Arc::new(RecordingTransport::new(|_, _| Ok(RpcResponse::JobResult(None))));
        let compute = Compute::new(transport, Duration::from_secs(1));

        let result = compute.execute(&nodes(1), "VOID", Vec::new()).await.unwrap();
        assert!(!result.has_value());
        assert_eq!(result.get::<String>().unwrap_err(), Error::EmptyResult);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let transport = Arc::new(RecordingTransport::new(|_, request| match request {
            RpcRequest::ExecuteJob { job_name, .. } if job_name == "FAIL" => {
                Err(RpcError::job_failed("division by zero").into())
            }
            _ => Err(Error::connection("connection reset")),
        }));
        let compute = Compute::new(transport, Duration::from_secs(1));
        let candidates = nodes(1);

        let error = compute.execute(&candidates, "FAIL", Vec::new()).await.unwrap_err();
        assert_eq!(error, Error::JobExecution("division by zero".to_string()));

        let error = compute.execute(&candidates, "OTHER", Vec::new()).await.unwrap_err();
        assert_eq!(
            error,
            Error::Connection {
                node: Some("node-id-0".to_string()),
                message: "connection reset".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_timeout_then_success() {
        let slow = Arc::new(
            RecordingTransport::cluster(node_descriptors("10.0.0.1", 3344, 1))
                .with_latency(Duration::from_millis(50)),
        );
        let compute = Compute::new(slow, Duration::from_secs(1));
        let candidates = nodes(1);

        let error = compute
            .execute_with_timeout(&candidates, "JOB", Vec::new(), Duration::from_millis(5))
            .await
            .unwrap_err();
        assert_eq!(error, Error::Timeout);
        assert_eq!(JobState::from_error(&error), JobState::TimedOut);

        let result = compute.execute(&candidates, "JOB", Vec::new()).await.unwrap();
        assert!(result.has_value());
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let transport = cluster_transport();
        let compute = Compute::new(transport.clone(), Duration::from_secs(1));
        transport.close().await;

        // closed takes precedence over argument errors
        let error = compute.execute(&[], "JOB", Vec::new()).await.unwrap_err();
        assert_eq!(error, Error::ConnectionClosed);
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_job_state() {
        assert_eq!(JobState::from_error(&Error::connection("x")), JobState::TransportFailed);
        assert_eq!(JobState::from_error(&Error::JobExecution("x".into())), JobState::JobFailed);
        assert!(JobState::Completed.is_terminal());
        assert!(!JobState::Submitted.is_terminal());
        assert_eq!(JobState::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn test_job_builder() {
        let id = NodeId::new("n").unwrap();
        assert_eq!(id.as_str(), "n");
        let job = Job::new("ECHO").arg("hello").args(vec![Value::Bool(true)]);
        assert_eq!(job.name(), "ECHO");
        assert_eq!(job.arguments(), &[Value::String("hello".to_string()), Value::Bool(true)]);
    }
}
