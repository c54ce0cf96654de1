//! Configuration
//!
//! Loaded from a TOML file at startup; every section falls back to
//! defaults so a missing or partial file still yields a runnable
//! configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::OcppVersion;
use crate::engine::SessionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Subprotocol names, preference order (highest first).
    pub supported_versions: Vec<String>,
    /// Heartbeat interval handed to charge points at boot, in seconds.
    pub heartbeat_interval_secs: i32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            supported_versions: vec!["ocpp2.0.1".to_string(), "ocpp1.6".to_string()],
            heartbeat_interval_secs: 300,
        }
    }
}

impl ProtocolConfig {
    /// Parsed version list; unknown subprotocol names are dropped.
    pub fn versions(&self) -> Vec<OcppVersion> {
        self.supported_versions
            .iter()
            .filter_map(|s| OcppVersion::from_subprotocol(s))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Retention window for posted sessions, in hours.
    pub retention_hours: i64,
    /// How often the purge sweep runs, in seconds.
    pub purge_interval_secs: u64,
    /// Echo the existing transaction id on concurrent-transaction
    /// conflicts.
    pub reuse_existing_transaction: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            retention_hours: 4,
            purge_interval_secs: 300,
            reuse_existing_transaction: true,
        }
    }
}

impl SessionsConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reuse_existing_transaction: self.reuse_existing_transaction,
            retention: chrono::Duration::hours(self.retention_hours),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub protocol: ProtocolConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Default config path: `~/.config/ocpp-engine/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocpp-engine")
        .join("config.toml")
}
