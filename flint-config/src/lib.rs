//! # Flint Client Configuration
//!
//! Configuration for the Flint cluster compute client.
//! Supports YAML, TOML, JSON formats with `FLINT_*` environment variable overrides.

pub mod builder;
pub mod config;
pub mod env;
pub mod loader;
pub mod logging;
pub mod validation;

pub use builder::ConfigBuilder;
pub use config::*;
pub use env::EnvOverride;
pub use loader::{ConfigFormat, ConfigLoader};
pub use logging::init_logging;
pub use validation::validate_config;

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),
}

impl From<ConfigError> for flint_core::Error {
    fn from(e: ConfigError) -> Self {
        flint_core::Error::InvalidArgument(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
