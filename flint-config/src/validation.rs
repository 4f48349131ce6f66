//! Configuration validation utilities

use crate::{config::*, ConfigError, Result};
use std::collections::HashSet;

const VALID_SERIALIZATIONS: [&str; 4] = ["json", "msgpack", "messagepack", "bincode"];
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 2] = ["json", "text"];

/// Validate complete configuration
pub fn validate_config(config: &ClientConfig) -> Result<()> {
    validate_addresses(config)?;
    validate_timeouts(config)?;
    validate_wire(config)?;

    if let Some(ref logging) = config.logging {
        validate_logging_config(logging)?;
    }

    Ok(())
}

/// Validate node addresses
pub fn validate_addresses(config: &ClientConfig) -> Result<()> {
    if config.node_addresses.is_empty() {
        return Err(ConfigError::Validation(
            "At least one node address is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for address in &config.node_addresses {
        if !seen.insert(address) {
            return Err(ConfigError::Validation(format!(
                "Duplicate node address '{}'",
                address
            )));
        }
    }

    Ok(())
}

/// Validate timeouts and heartbeat interval
pub fn validate_timeouts(config: &ClientConfig) -> Result<()> {
    if config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation("Connect timeout must be greater than 0".to_string()));
    }

    if config.connect_timeout_ms > 600_000 {
        return Err(ConfigError::Validation(
            "Connect timeout should not exceed 10 minutes".to_string(),
        ));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation("Request timeout must be greater than 0".to_string()));
    }

    if let Some(interval) = config.heartbeat_interval_ms {
        if interval < 100 {
            return Err(ConfigError::Validation(
                "Heartbeat interval should be at least 100ms".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate serialization and framing settings
pub fn validate_wire(config: &ClientConfig) -> Result<()> {
    let format = config.serialization.to_lowercase();
    if !VALID_SERIALIZATIONS.contains(&format.as_str()) {
        return Err(ConfigError::Validation(format!(
            "Invalid serialization '{}'. Valid values: {:?}",
            config.serialization, VALID_SERIALIZATIONS
        )));
    }

    if config.max_message_size < 1024 {
        return Err(ConfigError::Validation(
            "Max message size must be at least 1KB".to_string(),
        ));
    }

    if config.max_message_size > 1024 * 1024 * 1024 {
        return Err(ConfigError::Validation(
            "Max message size should not exceed 1GB".to_string(),
        ));
    }

    Ok(())
}

/// Validate logging configuration
pub fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    // directives like "flint_rpc=debug,info" are passed to the filter as is
    let is_directive = config.level.contains('=') || config.level.contains(',');
    if !is_directive && !VALID_LOG_LEVELS.contains(&config.level.to_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "Invalid log level '{}'. Valid values: {:?}",
            config.level, VALID_LOG_LEVELS
        )));
    }

    if !VALID_LOG_FORMATS.contains(&config.format.as_str()) {
        return Err(ConfigError::Validation(format!(
            "Invalid log format '{}'. Valid values: {:?}",
            config.format, VALID_LOG_FORMATS
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_net::Address;

    fn valid() -> ClientConfig {
        ClientConfig::new(vec![Address::new("127.0.0.1", 3344).unwrap()])
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_addresses_required() {
        let config = ClientConfig::default();
        assert!(matches!(validate_config(&config), Err(ConfigError::Validation(_))));

        let mut config = valid();
        config.node_addresses.push(Address::new("127.0.0.1", 3344).unwrap());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_timeouts() {
        let mut config = valid();
        config.request_timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.heartbeat_interval_ms = Some(10);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_wire_settings() {
        let mut config = valid();
        config.serialization = "protobuf".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.max_message_size = 16;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_logging_validation() {
        let mut logging = LoggingConfig::default();
        assert!(validate_logging_config(&logging).is_ok());

        logging.level = "flint_rpc=trace,info".to_string();
        assert!(validate_logging_config(&logging).is_ok());

        logging.level = "loud".to_string();
        assert!(validate_logging_config(&logging).is_err());

        logging.level = "info".to_string();
        logging.format = "xml".to_string();
        assert!(validate_logging_config(&logging).is_err());
    }
}
