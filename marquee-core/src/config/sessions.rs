//! Session configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Session cookie name
    /// Default: "marquee_session"
    pub cookie_name: String,

    /// Session lifetime in seconds
    /// Env: MARQUEE_SESSION_MAX_AGE
    /// Default: 1209600 (two weeks)
    pub max_age_secs: u64,

    /// Mark the cookie `Secure` (HTTPS only)
    /// Env: MARQUEE_SECURE_COOKIE
    /// Default: false
    pub secure_cookie: bool,

    /// Accept `Authorization: Bearer <session id>` as well as the cookie
    /// Default: true
    pub bearer_enabled: bool,

    /// Interval of the expired-session sweep; 0 disables it
    /// Default: 300
    pub cleanup_interval_secs: u64,

    /// Where anonymous users are sent from protected routes
    /// Default: "/accounts/login/"
    pub login_path: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            cookie_name: "marquee_session".to_string(),
            max_age_secs: 14 * 24 * 3600,
            secure_cookie: false,
            bearer_enabled: true,
            cleanup_interval_secs: 300,
            login_path: "/accounts/login/".to_string(),
        }
    }
}

impl SessionsConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(age) = env::var("MARQUEE_SESSION_MAX_AGE") {
            if let Ok(a) = age.parse() {
                self.max_age_secs = a;
            }
        }

        if let Ok(secure) = env::var("MARQUEE_SECURE_COOKIE") {
            self.secure_cookie = secure.parse().unwrap_or(false);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cookie_name.is_empty() {
            bail!("Invalid cookie_name: cannot be empty");
        }
        if self.max_age_secs == 0 {
            bail!("Invalid max_age_secs: must be greater than 0");
        }
        if self.cleanup_interval_secs == 0 {
            bail!("Invalid cleanup_interval_secs: must be greater than 0");
        }
        if !self.login_path.starts_with('/') {
            bail!("Invalid login_path: must be an absolute path");
        }
        Ok(())
    }
}
