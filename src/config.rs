//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub historian: HistorianConfig,

    #[serde(default)]
    pub credential: Credential,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Historian server addressing
#[derive(Debug, Clone, Deserialize)]
pub struct HistorianConfig {
    #[serde(default = "default_server_name")]
    pub server_name: String,

    #[serde(default = "default_database_name")]
    pub database_name: String,
}

fn default_server_name() -> String {
    "localhost".to_string()
}

fn default_database_name() -> String {
    "default".to_string()
}

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            database_name: default_database_name(),
        }
    }
}

/// Credential for the historian handshake
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub secret: String,

    #[serde(default)]
    pub auth_domain: String,
}

/// Display formatting options
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// chrono strftime pattern for timestamps in report output
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    "%Y.%m.%d. %H:%M:%S".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("historian-client").join("config.toml")),
            Some(PathBuf::from("/etc/historian-client/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(server) = std::env::var("HISTORIAN_SERVER") {
            self.historian.server_name = server;
        }
        if let Ok(database) = std::env::var("HISTORIAN_DATABASE") {
            self.historian.database_name = database;
        }

        if let Ok(username) = std::env::var("HISTORIAN_USERNAME") {
            self.credential.username = username;
        }
        if let Ok(secret) = std::env::var("HISTORIAN_SECRET") {
            self.credential.secret = secret;
        }
        if let Ok(domain) = std::env::var("HISTORIAN_AUTH_DOMAIN") {
            self.credential.auth_domain = domain;
        }

        if let Ok(format) = std::env::var("HISTORIAN_DATE_FORMAT") {
            self.display.date_format = format;
        }

        if let Ok(level) = std::env::var("HISTORIAN_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("HISTORIAN_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Historian client configuration
#
# Environment variables override these settings:
# - HISTORIAN_SERVER
# - HISTORIAN_DATABASE
# - HISTORIAN_USERNAME
# - HISTORIAN_SECRET
# - HISTORIAN_AUTH_DOMAIN
# - HISTORIAN_DATE_FORMAT
# - HISTORIAN_LOG_LEVEL
# - HISTORIAN_LOG_FORMAT

[historian]
# Historian host identifier
server_name = "localhost"

# Database to open within the system
database_name = "default"

[credential]
# Account used for the system-level handshake
username = ""
secret = ""
auth_domain = ""

[display]
# chrono strftime pattern for report timestamps
date_format = "%Y.%m.%d. %H:%M:%S"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.historian.server_name, "localhost");
        assert_eq!(config.historian.database_name, "default");
        assert_eq!(config.display.date_format, "%Y.%m.%d. %H:%M:%S");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[historian]
server_name = "SRV01"
database_name = "PlantDB"

[credential]
username = "svc-historian"
auth_domain = "emea"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.historian.server_name, "SRV01");
        assert_eq!(config.historian.database_name, "PlantDB");
        assert_eq!(config.credential.username, "svc-historian");
        assert_eq!(config.credential.auth_domain, "emea");
        // Untouched sections fall back to defaults
        assert_eq!(config.display.date_format, "%Y.%m.%d. %H:%M:%S");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "this is not toml [").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_default_config_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.historian.server_name, "localhost");
    }
}
