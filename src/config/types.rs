//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP port, matching the port the browser client expects.
pub const DEFAULT_PORT: u16 = 5000;

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl Config {
    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// HTTP server and storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("task-tree/tasks.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Background archiving of completed tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Run the periodic sweep (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between sweeps (default: 300).
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl ArchiveConfig {
    /// Sweep period. Never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_seconds() -> u64 {
    300 // 5 minutes
}

/// Page sizes for the list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> u32 {
    10
}

fn default_max_limit() -> u32 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.bind_addr(), "127.0.0.1:5000");
        assert!(config.archive.enabled);
        assert_eq!(config.archive.interval(), Duration::from_secs(300));
        assert_eq!(config.pagination.default_limit, 10);
        assert_eq!(config.pagination.max_limit, 100);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("archive:\n  interval_seconds: 60\n").unwrap();
        assert_eq!(config.archive.interval_seconds, 60);
        assert!(config.archive.enabled);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn zero_interval_is_clamped() {
        let archive = ArchiveConfig {
            enabled: true,
            interval_seconds: 0,
        };
        assert_eq!(archive.interval(), Duration::from_secs(1));
    }
}
