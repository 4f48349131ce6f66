//! Configuration builder for programmatic config creation

use crate::config::*;
use flint_net::Address;
use std::time::Duration;

/// Fluent configuration builder
#[derive(Default)]
pub struct ConfigBuilder {
    config: ClientConfig,
}

impl ConfigBuilder {
    /// Create a new config builder
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Add a node address
    pub fn node_address(mut self, address: Address) -> Self {
        self.config.node_addresses.push(address);
        self
    }

    /// Add several node addresses
    pub fn node_addresses(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.config.node_addresses.extend(addresses);
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set default request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable heartbeats
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    /// Set serialization format by name
    pub fn serialization(mut self, format: &str) -> Self {
        self.config.serialization = format.to_string();
        self
    }

    /// Enable or disable frame compression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Set maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Configure logging
    pub fn logging(mut self, f: impl FnOnce(LoggingBuilder) -> LoggingBuilder) -> Self {
        let builder = LoggingBuilder::new(self.config.logging.take().unwrap_or_default());
        self.config.logging = Some(f(builder).build());
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Logging configuration builder
pub struct LoggingBuilder {
    config: LoggingConfig,
}

impl LoggingBuilder {
    fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    pub fn level(mut self, level: &str) -> Self {
        self.config.level = level.to_string();
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.config.format = format.to_string();
        self
    }

    pub fn colored(mut self, colored: bool) -> Self {
        self.config.colored = colored;
        self
    }

    pub fn with_target(mut self, with_target: bool) -> Self {
        self.config.with_target = with_target;
        self
    }

    fn build(self) -> LoggingConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .node_address(Address::new("127.0.0.1", 3344).unwrap())
            .node_address(Address::new("127.0.0.1", 3345).unwrap())
            .connect_timeout(Duration::from_secs(2))
            .request_timeout(Duration::from_millis(1500))
            .heartbeat_interval(Duration::from_secs(10))
            .serialization("bincode")
            .compression(true)
            .logging(|l| l.level("debug").format("json"))
            .build();

        assert_eq!(config.node_addresses.len(), 2);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_millis(1500));
        assert_eq!(config.heartbeat_interval(), Some(Duration::from_secs(10)));
        assert_eq!(config.serialization, "bincode");
        assert!(config.compression);

        let logging = config.logging.unwrap();
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, "json");
        assert!(logging.colored);
    }

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build();
        assert!(config.node_addresses.is_empty());
        assert_eq!(config.serialization, "msgpack");
        assert!(config.logging.is_none());
        assert!(config.heartbeat_interval().is_none());
    }
}
