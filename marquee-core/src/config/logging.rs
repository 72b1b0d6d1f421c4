//! Logging configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, e.g. "info" or "info,marquee_core::store=debug"
    /// Env: MARQUEE_LOG_LEVEL
    pub level: String,
    /// Env: MARQUEE_LOG_FORMAT ("text" or "json")
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(level) = env::var("MARQUEE_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("MARQUEE_LOG_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "json" => self.format = LogFormat::Json,
                "text" => self.format = LogFormat::Text,
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            bail!("Invalid logging level: cannot be empty");
        }
        Ok(())
    }
}
