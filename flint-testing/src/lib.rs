//! # Flint Testing Utilities
//!
//! Test doubles for the Flint cluster compute client:
//! - [`MockCluster`]: in-process nodes speaking the real wire protocol
//! - [`RecordingTransport`]: scripted transport recording every request
//! - Built-in jobs ([`NODE_NAME_JOB`], [`ECHO_JOB`], [`VOID_JOB`],
//!   [`SLEEP_JOB`], [`ERROR_JOB`])

pub mod cluster;
pub mod jobs;
pub mod mock_node;
pub mod recording;

pub use cluster::{MockCluster, MockClusterConfig};
pub use jobs::{
    JobContext, JobOutcome, JobRegistry, ECHO_JOB, ERROR_JOB, NODE_NAME_JOB, NODE_RUNNER_PREFIX,
    SLEEP_JOB, VOID_JOB,
};
pub use mock_node::MockNode;
pub use recording::{node_descriptors, RecordedCall, RecordingTransport};
