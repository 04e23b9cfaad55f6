//! Registry of active sessions
//!
//! The only shared mutable state of the relay. Every mutation and every
//! snapshot happens under one lock, and the lock is never held across I/O.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::session::Session;
use crate::types::SessionId;

/// Shared handle to the set of active sessions
///
/// Cloning is cheap; all clones see the same sessions. A session is in
/// the registry exactly while it is `Active`: the state transitions are
/// performed under the same lock as the insert and the remove.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sessions: Arc<Mutex<HashMap<SessionId, Arc<Session>>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a session, moving it from `Connecting` to `Active`
    ///
    /// Returns false if the session was already closed or registered.
    pub fn add(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.sessions.lock();

        if !session.activate() {
            return false;
        }

        let id = session.id();
        let previous = sessions.insert(id, session);
        debug_assert!(previous.is_none(), "session {} registered twice", id);

        debug!("Session {} registered, total sessions: {}", id, sessions.len());
        true
    }

    /// Remove a session, moving it from `Active` to `Closed`
    ///
    /// Removing an absent session is a no-op. Returns true only for the
    /// call that actually removed it.
    pub fn remove(&self, session: &Session) -> bool {
        let mut sessions = self.sessions.lock();

        if sessions.remove(&session.id()).is_none() {
            return false;
        }
        session.deactivate();

        debug!(
            "Session {} deregistered, total sessions: {}",
            session.id(),
            sessions.len()
        );
        true
    }

    /// Point-in-time copy of the current members
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().values().cloned().collect()
    }

    /// Check if a session with this id is registered
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    /// Get the number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Check if no session is registered
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::testing::open_session;
    use crate::types::SessionState;

    #[tokio::test]
    async fn test_add_and_remove() {
        let registry = Registry::new();
        let (session, _reader, _peer) = open_session("alice", &SessionConfig::default()).await;

        assert!(registry.is_empty());
        assert!(registry.add(Arc::clone(&session)));
        assert!(registry.contains(session.id()));
        assert_eq!(registry.len(), 1);
        assert_eq!(session.state(), SessionState::Active);

        assert!(registry.remove(&session));
        assert!(!registry.contains(session.id()));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let registry = Registry::new();
        let (session, _reader, _peer) = open_session("alice", &SessionConfig::default()).await;

        assert!(!registry.remove(&session));
        assert_eq!(session.state(), SessionState::Connecting);

        registry.add(Arc::clone(&session));
        assert!(registry.remove(&session));
        assert!(!registry.remove(&session));
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let registry = Registry::new();
        let (session, _reader, _peer) = open_session("alice", &SessionConfig::default()).await;

        assert!(registry.add(Arc::clone(&session)));
        assert!(!registry.add(Arc::clone(&session)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_session_not_admitted() {
        let registry = Registry::new();
        let (session, _reader, _peer) = open_session("alice", &SessionConfig::default()).await;

        session.close();
        assert!(!registry.add(Arc::clone(&session)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_point_in_time() {
        let registry = Registry::new();
        let config = SessionConfig::default();
        let (alice, _ra, _pa) = open_session("alice", &config).await;
        let (bob, _rb, _pb) = open_session("bob", &config).await;

        registry.add(Arc::clone(&alice));
        let snapshot = registry.snapshot();
        registry.add(Arc::clone(&bob));
        registry.remove(&alice);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), alice.id());
        assert_eq!(registry.snapshot()[0].id(), bob.id());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_join_leave_loses_no_update() {
        const SESSIONS: usize = 64;

        let registry = Registry::new();
        let config = SessionConfig::default();
        let mut sessions = Vec::new();
        let mut keep_alive = Vec::new();
        for i in 0..SESSIONS {
            let (session, reader, peer) = open_session(&format!("user{}", i), &config).await;
            sessions.push(session);
            keep_alive.push((reader, peer));
        }

        let mut handles = Vec::new();
        for (i, session) in sessions.iter().enumerate() {
            let registry = registry.clone();
            let session = Arc::clone(session);
            handles.push(tokio::spawn(async move {
                registry.add(Arc::clone(&session));
                tokio::task::yield_now().await;
                // Every odd session leaves again
                if i % 2 == 1 {
                    assert!(registry.remove(&session));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len(), SESSIONS / 2);
        for (i, session) in sessions.iter().enumerate() {
            assert_eq!(registry.contains(session.id()), i % 2 == 0);
            assert_eq!(session.is_active(), i % 2 == 0);
        }
    }
}
