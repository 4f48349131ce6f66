//! # Flint Compute
//!
//! Cluster compute client: tracks the nodes of a Flint cluster, routes named
//! jobs to one of them and returns typed results.
//!
//! ```no_run
//! # async fn run() -> flint_core::Result<()> {
//! use flint_compute::Client;
//! use flint_config::ConfigBuilder;
//! use std::time::Duration;
//!
//! let config = ConfigBuilder::new()
//!     .node_address("127.0.0.1:3344".parse()?)
//!     .build();
//! let client = Client::start(config, Duration::from_secs(30)).await?;
//!
//! let nodes = client.get_cluster_nodes().await?;
//! let result = client.compute().execute(&nodes, "NODE_NAME_JOB", Vec::new()).await?;
//! println!("ran on {}", result.get::<String>()?);
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod compute;
pub mod envelope;
pub mod node;
pub mod selection;
pub mod topology;

pub use client::Client;
pub use compute::{Compute, Job, JobState, JobTarget};
pub use envelope::JobResult;
pub use node::{ClusterNode, NodeId};
pub use selection::{FirstNodeSelector, NodeSelector, RandomSelector, RoundRobinSelector};
pub use topology::{TopologyProvider, TopologySnapshot};

pub use flint_core::{Error, Result};
pub use flint_rpc::{FromValue, Value, ValueType};
