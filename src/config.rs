//! Configuration loading.
//!
//! Configuration comes from an optional TOML file (first CLI argument); every
//! field has a default so the server also runs with no file at all. The
//! listening port additionally honours the `CHATFSD_PORT` environment
//! variable, which takes precedence over the file.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid listen address '{0}'")]
    Address(String),
}

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Network listen configuration.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Listen address configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    50051
}

fn default_db_path() -> String {
    "chatfsd.db".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from the given file, or fall back to defaults when no file is
    /// named. Applies the `CHATFSD_PORT` environment override either way.
    pub fn load_or_default(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.override_port(std::env::var("CHATFSD_PORT").ok().as_deref());
        Ok(config)
    }

    /// Apply a port override from the environment, if present and valid.
    fn override_port(&mut self, value: Option<&str>) {
        if let Some(raw) = value {
            match raw.parse::<u16>() {
                Ok(port) => self.listen.port = port,
                Err(_) => warn!(value = %raw, "ignoring invalid CHATFSD_PORT"),
            }
        }
    }

    /// The resolved listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.listen.host, self.listen.port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }
}
