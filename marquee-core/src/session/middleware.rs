//! Session resolution for HTTP requests

use super::cookie::{CookieConfig, SessionCookie};
use super::{Session, SessionStore};
use crate::config::SessionsConfig;
use crate::views::FlashMessage;
use anyhow::Result;
use chrono::{Duration, Utc};
use http::HeaderMap;
use std::sync::Arc;

/// Finds, creates and expires sessions for requests
///
/// The session id is read from the cookie first, then from an
/// `Authorization: Bearer` header when enabled.
pub struct SessionMiddleware<S: SessionStore> {
    store: Arc<S>,
    cookie: SessionCookie,
    max_age: Duration,
    bearer_enabled: bool,
}

impl<S: SessionStore> SessionMiddleware<S> {
    pub fn new(store: Arc<S>, config: &SessionsConfig) -> Self {
        Self {
            store,
            cookie: SessionCookie::new(CookieConfig::from(config)),
            max_age: i64::try_from(config.max_age_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or_else(|| Duration::days(14)),
            bearer_enabled: config.bearer_enabled,
        }
    }

    /// Load the live session named by the request headers
    ///
    /// Expired sessions are deleted and treated as absent.
    pub async fn extract_session(&self, headers: &HeaderMap) -> Result<Option<Session>> {
        let Some(id) = self.extract_session_id(headers) else {
            return Ok(None);
        };

        match self.store.get(&id).await? {
            Some(session) if session.is_expired() => {
                log::debug!("Session {} expired", id);
                self.store.delete(&id).await?;
                Ok(None)
            }
            Some(session) => Ok(Some(session)),
            None => Ok(None),
        }
    }

    /// Fresh session with a uuid v4 id; not stored until [`Self::save`]
    pub fn new_session(&self) -> Session {
        Session::new(uuid::Uuid::new_v4().to_string(), Utc::now() + self.max_age)
    }

    /// Store `session` whole; for sessions created during this request
    pub async fn save(&self, session: Session) -> Result<()> {
        self.store.set(session).await
    }

    /// Fold one request's flash changes into the stored session and touch it
    ///
    /// Concurrent requests on the same session each load their own copy, so
    /// only this request's delta is written back. A session deleted in the
    /// meantime stays deleted.
    pub async fn merge(
        &self,
        id: &str,
        shown: Vec<FlashMessage>,
        pushed: Vec<FlashMessage>,
    ) -> Result<()> {
        let found = self
            .store
            .update(
                id,
                Box::new(move |session: &mut Session| {
                    session.touch();
                    session.settle_messages(&shown, pushed)
                }),
            )
            .await?;
        if !found {
            log::debug!("Session {} was removed before the request finished", id);
        }
        Ok(())
    }

    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.store.delete(id).await
    }

    pub fn set_cookie(&self, session: &Session) -> String {
        self.cookie.build_set_cookie(&session.id)
    }

    pub fn delete_cookie(&self) -> String {
        self.cookie.build_delete_cookie()
    }

    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    fn extract_session_id(&self, headers: &HeaderMap) -> Option<String> {
        let from_cookie = headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| self.cookie.extract_from_header(header));
        if from_cookie.is_some() {
            return from_cookie;
        }

        if self.bearer_enabled {
            return headers
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }

        None
    }
}
