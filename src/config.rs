//! Configuration management for the gateway.
//!
//! Handles loading configuration from TOML files and environment variables.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string, either `postgres://...` or `jdbc:postgresql://...`.
    pub url: Option<String>,

    /// Upper bound for the liveness probe run before every statement.
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,

    /// Upper bound for opening a new connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_liveness_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            liveness_timeout_secs: default_liveness_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Runtime knobs for the connection guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Timeout for the liveness probe.
    pub liveness_timeout: Duration,
    /// Timeout for acquiring a fresh connection.
    pub connect_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(default_liveness_timeout_secs()),
            connect_timeout: Duration::from_secs(default_connect_timeout_secs()),
        }
    }
}

impl GatewayConfig {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-gateway")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            GatewayError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Fills a missing database url from `DATABASE_URL`, loading `.env` first if present.
    pub fn apply_env_defaults(&mut self) {
        let _ = dotenvy::dotenv();
        if self.database.url.is_none() {
            self.database.url = std::env::var("DATABASE_URL").ok();
        }
    }

    /// Returns the configured connection string.
    pub fn require_url(&self) -> Result<&str> {
        self.database
            .url
            .as_deref()
            .ok_or_else(|| {
                GatewayError::config("No database url configured (set [database].url or DATABASE_URL)")
            })
    }

    /// Returns the guardian options derived from this configuration.
    pub fn options(&self) -> GatewayOptions {
        GatewayOptions {
            liveness_timeout: Duration::from_secs(self.database.liveness_timeout_secs),
            connect_timeout: Duration::from_secs(self.database.connect_timeout_secs),
        }
    }
}
