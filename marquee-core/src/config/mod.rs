//! Configuration for Marquee
//!
//! # Configuration Hierarchy
//!
//! Values are resolved in the following order (highest priority wins):
//!
//! 1. **CLI flags** applied by the `marquee` binary
//! 2. **Environment Variables** (`MARQUEE_*`)
//! 3. **Config File** (config.toml)
//! 4. **Defaults**
//!
//! Every section derives `serde(default)`, so a config file only needs the
//! keys it changes.

pub mod logging;
pub mod orders;
pub mod server;
pub mod sessions;
pub mod storage;

pub use logging::{LogFormat, LoggingConfig};
pub use orders::OrdersConfig;
pub use server::ServerConfig;
pub use sessions::SessionsConfig;
pub use storage::StorageConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete Marquee configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarqueeConfig {
    pub server: ServerConfig,
    pub sessions: SessionsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub orders: OrdersConfig,
}

impl MarqueeConfig {
    /// Load `config.toml` from the working directory, then the environment
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file; a missing file means defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars();

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.server.merge(other.server);
        self.sessions.merge(other.sessions);
        self.storage.merge(other.storage);
        self.logging.merge(other.logging);
        self.orders.merge(other.orders);
    }

    /// Apply `MARQUEE_*` environment variables
    pub fn apply_env_vars(&mut self) {
        self.server.apply_env_vars();
        self.sessions.apply_env_vars();
        self.storage.apply_env_vars();
        self.logging.apply_env_vars();
        self.orders.apply_env_vars();
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.sessions.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        self.orders.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MarqueeConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.sessions.cookie_name, "marquee_session");
        assert!(!config.storage.in_memory);
        assert!(config.orders.ledger_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9123\n\n[storage]\nfsync = true").unwrap();

        let config = MarqueeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9123);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.storage.fsync);
        assert_eq!(config.sessions.max_age_secs, 14 * 24 * 3600);
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let err = MarqueeConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }
}
