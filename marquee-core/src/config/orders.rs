//! Purchase ledger configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    /// JSON file with the purchase items feeding the top-customer report.
    /// Without one the report runs over an empty ledger.
    /// Env: MARQUEE_ORDERS_LEDGER
    pub ledger_path: Option<PathBuf>,
}

impl OrdersConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(path) = env::var("MARQUEE_ORDERS_LEDGER") {
            self.ledger_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.ledger_path {
            if path.as_os_str().is_empty() {
                bail!("Invalid orders ledger_path: cannot be empty");
            }
        }
        Ok(())
    }
}
