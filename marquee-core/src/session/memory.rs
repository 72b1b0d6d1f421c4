//! In-memory session storage
//!
//! Sessions are lost on restart; users log in again.

use super::store::{Session, SessionStore, SessionUpdate};
use anyhow::Result;
use scc::HashMap as SccHashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<SccHashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read_async(id, |_, session| session.clone()).await)
    }

    async fn set(&self, session: Session) -> Result<()> {
        match self.sessions.entry_async(session.id.clone()).await {
            scc::hash_map::Entry::Occupied(mut o) => *o.get_mut() = session,
            scc::hash_map::Entry::Vacant(v) => {
                v.insert_entry(session);
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove_async(id).await;
        Ok(())
    }

    async fn update(&self, id: &str, update: SessionUpdate) -> Result<bool> {
        match self.sessions.entry_async(id.to_string()).await {
            scc::hash_map::Entry::Occupied(mut o) => {
                update(o.get_mut())?;
                Ok(true)
            }
            scc::hash_map::Entry::Vacant(_) => Ok(false),
        }
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let before = self.sessions.len();
        self.sessions.retain_async(|_, session| !session.is_expired()).await;
        Ok(before.saturating_sub(self.sessions.len()))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemorySessionStore::new();
        store.set(Session::new("a".into(), Utc::now() + Duration::hours(1))).await.unwrap();

        assert!(store.exists("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap().map(|s| s.id), Some("a".to_string()));

        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let store = MemorySessionStore::new();
        store.set(Session::new("a".into(), Utc::now() + Duration::hours(1))).await.unwrap();

        let updated = store
            .update("a", Box::new(|session: &mut Session| session.set("k", 1)))
            .await
            .unwrap();
        assert!(updated);
        assert_eq!(store.get("a").await.unwrap().unwrap().get::<i32>("k"), Some(1));

        let missing = store.update("b", Box::new(|_: &mut Session| Ok(()))).await.unwrap();
        assert!(!missing);
        assert!(!store.exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = MemorySessionStore::new();
        store.set(Session::new("live".into(), Utc::now() + Duration::hours(1))).await.unwrap();
        store.set(Session::new("dead".into(), Utc::now() - Duration::seconds(1))).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.exists("live").await.unwrap());
    }
}
