//! Server configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server listening port
    /// Env: MARQUEE_PORT
    /// Default: 8000
    pub port: u16,

    /// Server listening address
    /// Env: MARQUEE_HOST
    /// Default: "127.0.0.1"
    pub host: String,

    /// Request timeout in seconds
    /// Env: MARQUEE_REQUEST_TIMEOUT
    /// Default: 30
    pub request_timeout: u64,

    /// Maximum request body size in bytes
    /// Env: MARQUEE_MAX_BODY_SIZE
    /// Default: 1048576 (1MB)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "127.0.0.1".to_string(),
            request_timeout: 30,
            max_body_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.port = other.port;
        self.host = other.host;
        self.request_timeout = other.request_timeout;
        self.max_body_size = other.max_body_size;
    }

    /// Apply environment variables
    pub fn apply_env_vars(&mut self) {
        if let Ok(port) = env::var("MARQUEE_PORT") {
            if let Ok(p) = port.parse() {
                self.port = p;
            }
        }

        if let Ok(host) = env::var("MARQUEE_HOST") {
            self.host = host;
        }

        if let Ok(timeout) = env::var("MARQUEE_REQUEST_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.request_timeout = t;
            }
        }

        if let Ok(size) = env::var("MARQUEE_MAX_BODY_SIZE") {
            if let Ok(s) = size.parse() {
                self.max_body_size = s;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            bail!("Invalid host: host cannot be empty");
        }

        if self.request_timeout == 0 {
            bail!("Invalid request_timeout: must be greater than 0");
        }

        if self.max_body_size == 0 {
            bail!("Invalid max_body_size: must be greater than 0");
        }

        Ok(())
    }

    /// `host:port` for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
