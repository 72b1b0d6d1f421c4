//! Session storage trait and types

use super::{MESSAGES_KEY, USER_ID_KEY};
use crate::models::UserId;
use crate::views::FlashMessage;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Session data - flexible key-value store
pub type SessionData = HashMap<String, serde_json::Value>;

/// In-place change applied by [`SessionStore::update`]
pub type SessionUpdate = Box<dyn FnOnce(&mut Session) -> Result<()> + Send>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID (uuid v4), also the Bearer token
    pub id: String,
    pub data: SessionData,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self { id, data: HashMap::new(), created_at: now, expires_at, last_accessed_at: now }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.data.insert(key.into(), json_value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.get(USER_ID_KEY)
    }

    pub fn set_user_id(&mut self, id: UserId) -> Result<()> {
        self.set(USER_ID_KEY, id)
    }

    /// Queue a flash message for the next page view
    pub fn push_message(&mut self, message: FlashMessage) -> Result<()> {
        let mut queued: Vec<FlashMessage> = self.get(MESSAGES_KEY).unwrap_or_default();
        queued.push(message);
        self.set(MESSAGES_KEY, queued)
    }

    /// Drain queued flash messages
    pub fn take_messages(&mut self) -> Vec<FlashMessage> {
        self.remove(MESSAGES_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn has_messages(&self) -> bool {
        self.data.contains_key(MESSAGES_KEY)
    }

    /// Queue `pushed`, then drop the messages one request already showed
    ///
    /// Used to fold a request's changes into a copy that other requests may
    /// have changed in the meantime.
    pub fn settle_messages(
        &mut self,
        shown: &[FlashMessage],
        pushed: Vec<FlashMessage>,
    ) -> Result<()> {
        let mut queued: Vec<FlashMessage> = self.get(MESSAGES_KEY).unwrap_or_default();
        queued.extend(pushed);
        for message in shown {
            if let Some(pos) = queued.iter().position(|m| m == message) {
                queued.remove(pos);
            }
        }

        if queued.is_empty() {
            self.remove(MESSAGES_KEY);
            Ok(())
        } else {
            self.set(MESSAGES_KEY, queued)
        }
    }
}

/// Session storage backend
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Session>>;

    async fn set(&self, session: Session) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Apply `update` to the stored session atomically; `false` if it is gone
    async fn update(&self, id: &str, update: SessionUpdate) -> Result<bool>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }

    /// Returns the number of sessions deleted
    async fn cleanup_expired(&self) -> Result<usize>;

    async fn count(&self) -> Result<usize>;
}
