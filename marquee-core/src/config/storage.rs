//! Storage configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `events.raftlog`
    /// Env: MARQUEE_DATA_DIR
    /// Default: "./data/marquee"
    pub data_dir: PathBuf,

    /// fsync after every journal append
    /// Env: MARQUEE_FSYNC
    /// Default: false
    pub fsync: bool,

    /// Keep everything in memory and write no journal
    /// Default: false
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data/marquee"), fsync: false, in_memory: false }
    }
}

impl StorageConfig {
    /// In-memory storage, used by tests and `--in-memory`
    pub fn memory() -> Self {
        Self { in_memory: true, ..Self::default() }
    }

    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(dir) = env::var("MARQUEE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(fsync) = env::var("MARQUEE_FSYNC") {
            self.fsync = fsync.parse().unwrap_or(false);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.in_memory && self.data_dir.as_os_str().is_empty() {
            bail!("Invalid data_dir: cannot be empty");
        }
        Ok(())
    }
}
