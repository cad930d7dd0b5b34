//! Configuration management for the jangdan engine
//!
//! This module handles loading and validating configuration from
//! environment variables, an optional TOML file, and command-line
//! arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How often the tick loop polls for due jobs, in seconds
    pub check_interval_secs: u64,

    /// Ceiling for retry backoff, in seconds
    pub max_backoff_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 10,
            max_backoff_secs: 3600,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/jobs.db"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the scheduler API binds to
    pub bind_address: SocketAddr,

    /// Enable CORS for browser dashboards
    pub enable_cors: bool,

    /// Enable per-request tracing
    pub enable_request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".parse().expect("valid default bind address"),
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let check_interval_secs = std::env::var("JANGDAN_CHECK_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        let max_backoff_secs = std::env::var("JANGDAN_MAX_BACKOFF")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);

        let sqlite_path = std::env::var("JANGDAN_SQLITE_PATH")
            .unwrap_or_else(|_| String::from("data/jobs.db"))
            .into();

        let bind_address = std::env::var("JANGDAN_BIND_ADDRESS")
            .unwrap_or_else(|_| String::from("0.0.0.0:8080"))
            .parse::<SocketAddr>()
            .context("JANGDAN_BIND_ADDRESS is not a valid socket address")?;

        let enable_cors = std::env::var("JANGDAN_ENABLE_CORS")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let enable_request_logging = std::env::var("JANGDAN_REQUEST_LOGGING")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let level = std::env::var("JANGDAN_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let format = std::env::var("JANGDAN_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        let config = Self {
            engine: EngineConfig {
                check_interval_secs,
                max_backoff_secs,
            },
            database: DatabaseConfig { sqlite_path },
            server: ServerConfig {
                bind_address,
                enable_cors,
                enable_request_logging,
            },
            logging: LoggingConfig { level, format },
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&contents).context("failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.check_interval_secs == 0 {
            anyhow::bail!("engine.check_interval_secs must be at least 1");
        }
        if self.engine.max_backoff_secs == 0 {
            anyhow::bail!("engine.max_backoff_secs must be at least 1");
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            );
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.check_interval_secs, 10);
        assert_eq!(config.server.bind_address.port(), 8080);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.engine.check_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = String::from("xml");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jangdan.toml");
        std::fs::write(
            &path,
            r#"
[engine]
check_interval_secs = 5
max_backoff_secs = 600

[database]
sqlite_path = "/tmp/jobs.db"

[server]
bind_address = "127.0.0.1:9000"
enable_cors = false
enable_request_logging = true

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.engine.check_interval_secs, 5);
        assert_eq!(config.server.bind_address.port(), 9000);
        assert!(!config.server.enable_cors);
        assert_eq!(config.logging.format, "json");
    }
}
