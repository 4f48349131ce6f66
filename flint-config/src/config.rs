//! Core configuration structures

use flint_net::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Flint client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Addresses of the cluster nodes to connect to
    #[serde(default)]
    pub node_addresses: Vec<Address>,

    /// TCP connect timeout per node in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Default job/request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Heartbeat interval in milliseconds (disabled when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u64>,

    /// Wire serialization format (json, msgpack, bincode)
    #[serde(default = "default_serialization")]
    pub serialization: String,

    /// Deflate-compress outgoing frames
    #[serde(default = "default_false")]
    pub compression: bool,

    /// Maximum encoded message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Logging sink; when present the client installs a global subscriber
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, text)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output
    #[serde(default = "default_true")]
    pub colored: bool,

    /// Include the event target (module path)
    #[serde(default = "default_true")]
    pub with_target: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_addresses: Vec::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            heartbeat_interval_ms: None,
            serialization: default_serialization(),
            compression: default_false(),
            max_message_size: default_max_message_size(),
            logging: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            colored: default_true(),
            with_target: default_true(),
        }
    }
}

// Default value functions
fn default_connect_timeout_ms() -> u64 { 5_000 }
fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_serialization() -> String { "msgpack".to_string() }
fn default_max_message_size() -> usize { 16 * 1024 * 1024 } // 16MB
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
fn default_true() -> bool { true }
fn default_false() -> bool { false }

impl ClientConfig {
    /// Create a configuration for the given node addresses
    pub fn new(node_addresses: Vec<Address>) -> Self {
        Self {
            node_addresses,
            ..Self::default()
        }
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get default request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Get heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval_ms.map(Duration::from_millis)
    }
}
