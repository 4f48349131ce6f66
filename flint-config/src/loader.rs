//! Configuration loading utilities

use crate::{config::ClientConfig, ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()?.to_str().map(|ext| match ext.to_lowercase().as_str() {
            "toml" => ConfigFormat::Toml,
            "json" => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        })
    }
}

/// Configuration loader
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    file_names: Vec<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            search_paths: vec![
                PathBuf::from("."),
                PathBuf::from("config"),
                PathBuf::from("/etc/flint"),
            ],
            file_names: vec!["flint".to_string(), "flint-client".to_string()],
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a search path
    pub fn add_search_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Add a file name (without extension) to search for
    pub fn add_file_name<S: Into<String>>(mut self, name: S) -> Self {
        self.file_names.push(name.into());
        self
    }

    /// Load configuration from a specific file
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<ClientConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let format = ConfigFormat::from_extension(path).unwrap_or(ConfigFormat::Yaml);
        Self::parse_str(&content, format)
    }

    /// Load configuration by searching for config files, falling back to defaults
    pub fn load(&self) -> Result<ClientConfig> {
        if let Some(path) = self.find_config_file() {
            tracing::info!("Loading configuration from: {}", path.display());
            return self.load_file(&path);
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(ClientConfig::default())
    }

    /// Load configuration and apply `FLINT_*` environment overrides
    pub fn load_with_env(&self) -> Result<ClientConfig> {
        let config = self.load()?;
        crate::env::EnvOverride::apply(config)
    }

    /// Load and validate a configuration file
    pub fn validate_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = self.load_file(path)?;
        crate::validation::validate_config(&config)
    }

    /// Parse configuration content in the given format
    pub fn parse_str(content: &str, format: ConfigFormat) -> Result<ClientConfig> {
        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(ConfigError::Yaml),
            ConfigFormat::Toml => toml::from_str(content).map_err(ConfigError::Toml),
            ConfigFormat::Json => serde_json::from_str(content).map_err(ConfigError::Json),
        }
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        let extensions = ["yaml", "yml", "toml", "json"];

        for search_path in &self.search_paths {
            for file_name in &self.file_names {
                for ext in &extensions {
                    let path = search_path.join(format!("{}.{}", file_name, ext));
                    if path.exists() {
                        return Some(path);
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_yaml_config() {
        let yaml_content = r#"
node_addresses:
  - "127.0.0.1:3344"
  - "127.0.0.1:3345"
request_timeout_ms: 2500
serialization: "json"

logging:
  level: "debug"
  format: "json"
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml_content.as_bytes()).unwrap();

        let config = ConfigLoader::new().load_file(file.path()).unwrap();

        assert_eq!(config.node_addresses.len(), 2);
        assert_eq!(config.node_addresses[1].port(), 3345);
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.connect_timeout_ms, 5_000);
        assert_eq!(config.serialization, "json");
        assert_eq!(config.logging.unwrap().level, "debug");
    }

    #[test]
    fn test_load_toml_config() {
        let toml_content = r#"
node_addresses = ["10.0.0.7:3344"]
connect_timeout_ms = 750
heartbeat_interval_ms = 1000
compression = true

[logging]
level = "warn"
"#;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = ConfigLoader::new().load_file(file.path()).unwrap();

        assert_eq!(config.node_addresses[0].host(), "10.0.0.7");
        assert_eq!(config.connect_timeout_ms, 750);
        assert_eq!(config.heartbeat_interval_ms, Some(1000));
        assert!(config.compression);
        let logging = config.logging.unwrap();
        assert_eq!(logging.level, "warn");
        assert_eq!(logging.format, "text");
    }

    #[test]
    fn test_invalid_address_rejected() {
        let result = ConfigLoader::parse_str(
            r#"{"node_addresses": ["127.0.0.1:0"]}"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_validate_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"node_addresses": []}"#).unwrap();

        let result = ConfigLoader::new().validate_file(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_extension(Path::new("flint.yaml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension(Path::new("flint.yml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension(Path::new("flint.toml")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension(Path::new("flint.json")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension(Path::new("flint")), None);
    }

    #[test]
    fn test_search_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cluster.toml"),
            "node_addresses = [\"127.0.0.1:3344\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .add_search_path(dir.path())
            .add_file_name("cluster")
            .load()
            .unwrap();
        assert_eq!(config.node_addresses.len(), 1);
    }
}
