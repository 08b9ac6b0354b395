//! Session persistence.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Session, SessionError, SessionId};

/// Session storage backend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session, restarting its idle expiry.
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionError>;

    /// Store a session, refreshing its expiry.
    async fn save(&self, id: &SessionId, session: Session) -> Result<(), SessionError>;

    /// Forget a session.
    async fn remove(&self, id: &SessionId) -> Result<(), SessionError>;
}

struct Entry {
    session: Session,
    touched: Instant,
}

/// In-process session store with idle expiry.
///
/// Sessions are lost on restart.
pub struct MemorySessionStore {
    entries: RwLock<HashMap<SessionId, Entry>>,
    ttl: Duration,
}

impl MemorySessionStore {
    /// Create a store whose sessions expire after `ttl` of inactivity.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Drop expired sessions. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.touched.elapsed() < self.ttl);
        before - entries.len()
    }

    /// Number of stored sessions, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .get_mut(id)
            .filter(|entry| entry.touched.elapsed() < self.ttl)
            .map(|entry| {
                entry.touched = Instant::now();
                entry.session.clone()
            }))
    }

    async fn save(&self, id: &SessionId, session: Session) -> Result<(), SessionError> {
        self.entries.write().await.insert(
            id.clone(),
            Entry {
                session,
                touched: Instant::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<(), SessionError> {
        self.entries.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let id = SessionId::generate();
        assert_eq!(store.load(&id).await.unwrap(), None);

        let mut session = Session::default();
        session.remember_original_url("/a");
        store.save(&id, session.clone()).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(session));

        store.remove(&id).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_extends_idle_expiry() {
        let store = MemorySessionStore::new(Duration::from_millis(300));
        let id = SessionId::generate();
        store.save(&id, Session::default()).await.unwrap();

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert!(store.load(&id).await.unwrap().is_some());
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.load(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible_and_purged() {
        let store = MemorySessionStore::new(Duration::ZERO);
        let id = SessionId::generate();
        store.save(&id, Session::default()).await.unwrap();

        assert_eq!(store.load(&id).await.unwrap(), None);
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.is_empty().await);
    }
}
