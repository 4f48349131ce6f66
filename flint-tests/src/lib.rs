//! Shared helpers for the end-to-end tests

use flint_compute::Client;
use flint_config::{ClientConfig, ConfigBuilder};
use flint_core::Result;
use flint_testing::MockCluster;
use std::future::Future;
use std::time::Duration;

/// Startup bound used by the tests
pub const START_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration pointing at every node of `cluster`
pub fn client_config(cluster: &MockCluster) -> ClientConfig {
    ConfigBuilder::new()
        .node_addresses(cluster.addresses())
        .request_timeout(Duration::from_secs(5))
        .build()
}

/// Start a client connected to `cluster`
pub async fn start_client(cluster: &MockCluster) -> Result<Client> {
    Client::start(client_config(cluster), START_TIMEOUT).await
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
