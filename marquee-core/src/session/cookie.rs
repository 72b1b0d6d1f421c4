//! Session cookie formatting and parsing

use super::SameSitePolicy;
use crate::config::SessionsConfig;

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    /// HTTPS only
    pub secure: bool,
    /// No JavaScript access
    pub http_only: bool,
    pub same_site: SameSitePolicy,
    /// Max age in seconds
    pub max_age: Option<u64>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self::from(&SessionsConfig::default())
    }
}

impl From<&SessionsConfig> for CookieConfig {
    fn from(config: &SessionsConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            path: "/".to_string(),
            secure: config.secure_cookie,
            http_only: true,
            same_site: SameSitePolicy::Lax,
            max_age: Some(config.max_age_secs),
        }
    }
}

pub struct SessionCookie {
    config: CookieConfig,
}

impl SessionCookie {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// `Set-Cookie` value carrying `session_id`
    pub fn build_set_cookie(&self, session_id: &str) -> String {
        let mut parts = vec![format!("{}={}", self.config.name, session_id)];
        parts.push(format!("Path={}", self.config.path));

        if let Some(max_age) = self.config.max_age {
            parts.push(format!("Max-Age={}", max_age));
        }
        if self.config.secure {
            parts.push("Secure".to_string());
        }
        if self.config.http_only {
            parts.push("HttpOnly".to_string());
        }
        parts.push(format!("SameSite={}", self.config.same_site.as_str()));

        parts.join("; ")
    }

    /// `Set-Cookie` value that expires the cookie
    pub fn build_delete_cookie(&self) -> String {
        format!(
            "{}=; Path={}; Max-Age=0; HttpOnly; SameSite={}",
            self.config.name,
            self.config.path,
            self.config.same_site.as_str()
        )
    }

    /// Session ID from a `Cookie` request header
    pub fn extract_from_header(&self, cookie_header: &str) -> Option<String> {
        let prefix = format!("{}=", self.config.name);
        cookie_header.split(';').find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(prefix.as_str())
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cookie_is_http_only_lax() {
        let cookie = SessionCookie::new(CookieConfig::default());
        let header = cookie.build_set_cookie("abc");

        assert!(header.starts_with("marquee_session=abc; Path=/"));
        assert!(header.contains("Max-Age=1209600"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn test_secure_flag_follows_config() {
        let config = SessionsConfig { secure_cookie: true, ..SessionsConfig::default() };
        let cookie = SessionCookie::new(CookieConfig::from(&config));
        assert!(cookie.build_set_cookie("abc").contains("; Secure"));
    }

    #[test]
    fn test_delete_cookie() {
        let cookie = SessionCookie::new(CookieConfig::default());
        assert!(cookie.build_delete_cookie().starts_with("marquee_session=; Path=/; Max-Age=0"));
    }

    #[test]
    fn test_extract_from_header() {
        let cookie = SessionCookie::new(CookieConfig::default());
        assert_eq!(
            cookie.extract_from_header("theme=dark; marquee_session=xyz; other=1"),
            Some("xyz".to_string())
        );
        assert_eq!(cookie.extract_from_header("marquee_session="), None);
        assert_eq!(cookie.extract_from_header("session=xyz"), None);
    }
}
