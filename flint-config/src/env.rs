//! Environment variable override support

use crate::{config::*, ConfigError, Result};
use flint_net::parse_addresses;
use std::env;
use std::str::FromStr;

/// Environment variable override utility
pub struct EnvOverride;

impl EnvOverride {
    /// Apply `FLINT_*` environment variable overrides to configuration
    pub fn apply(config: ClientConfig) -> Result<ClientConfig> {
        Self::apply_with(config, |key| env::var(key).ok())
    }

    /// Apply overrides read through `lookup` instead of the process environment
    pub fn apply_with<F>(mut config: ClientConfig, lookup: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addresses) = lookup("FLINT_NODE_ADDRESSES") {
            let items = addresses.split(',').filter(|s| !s.trim().is_empty());
            config.node_addresses = parse_addresses(items).map_err(|e| {
                ConfigError::Environment(format!("Invalid FLINT_NODE_ADDRESSES: {}", e))
            })?;
        }

        if let Some(timeout) = lookup("FLINT_CONNECT_TIMEOUT_MS") {
            config.connect_timeout_ms = parse_number("FLINT_CONNECT_TIMEOUT_MS", &timeout)?;
        }
        if let Some(timeout) = lookup("FLINT_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("FLINT_REQUEST_TIMEOUT_MS", &timeout)?;
        }
        if let Some(interval) = lookup("FLINT_HEARTBEAT_INTERVAL_MS") {
            config.heartbeat_interval_ms =
                Some(parse_number("FLINT_HEARTBEAT_INTERVAL_MS", &interval)?);
        }

        if let Some(format) = lookup("FLINT_SERIALIZATION") {
            config.serialization = format;
        }
        if let Some(compression) = lookup("FLINT_COMPRESSION") {
            config.compression = parse_bool(&compression)?;
        }
        if let Some(size) = lookup("FLINT_MAX_MESSAGE_SIZE") {
            config.max_message_size = parse_number("FLINT_MAX_MESSAGE_SIZE", &size)?;
        }

        // Any logging variable turns logging on
        let level = lookup("FLINT_LOG_LEVEL");
        let format = lookup("FLINT_LOG_FORMAT");
        if level.is_some() || format.is_some() {
            let logging = config.logging.get_or_insert_with(LoggingConfig::default);
            if let Some(level) = level {
                logging.level = level;
            }
            if let Some(format) = format {
                logging.format = format;
            }
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {}: '{}'", name, value)))
}

/// Parse boolean from string
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Environment(format!("Invalid boolean value: {}", value))),
    }
}
