//! Process-wide session store

use super::store::{Session, Turn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Session used when the caller does not name one
pub const DEFAULT_SESSION_ID: &str = "default";

/// Maps session identifiers to their conversation logs.
///
/// Individual `get`/`append`/`clear` calls are atomic. Callers that need a
/// whole user/assistant exchange to stay contiguous hold the session's
/// [`exchange_lock`](Self::exchange_lock) for its duration.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    exchange_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the session's turns; empty if the session was never seen
    pub fn get(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .read()
            .get(session_id)
            .map(|session| session.turns.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the whole session, if it exists
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Append a turn, creating the session if absent
    pub fn append(&self, session_id: &str, role: impl Into<String>, content: impl Into<String>) {
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        session.push(role, content);
        debug!(session_id, turns = session.turns.len(), "Appended turn");
    }

    /// Empty the session's log. The identifier stays usable.
    pub fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.write();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
            .clear();
    }

    /// Lock serializing exchanges against one session
    pub fn exchange_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.exchange_locks.read().get(session_id) {
            return lock.clone();
        }
        self.exchange_locks
            .write()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Identifiers of all known sessions, sorted
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of known sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_session_is_empty() {
        let store = SessionStore::new();
        assert!(store.get("nobody").is_empty());
        assert!(store.session("nobody").is_none());
    }

    #[test]
    fn test_append_then_get() {
        let store = SessionStore::new();
        store.append(DEFAULT_SESSION_ID, "user", "Hi");
        store.append(DEFAULT_SESSION_ID, "assistant", "Hello!");
        store.append(DEFAULT_SESSION_ID, "user", "How are you?");

        let turns = store.get(DEFAULT_SESSION_ID);
        assert_eq!(
            turns,
            vec![
                Turn::user("Hi"),
                Turn::assistant("Hello!"),
                Turn::user("How are you?"),
            ]
        );
    }

    #[test]
    fn test_append_accepts_arbitrary_role() {
        let store = SessionStore::new();
        store.append("s", "system", "Be brief.");
        assert_eq!(store.get("s").last(), Some(&Turn::new("system", "Be brief.")));
    }

    #[test]
    fn test_clear_keeps_session_reusable() {
        let store = SessionStore::new();
        store.append("s", "user", "one");
        store.clear("s");
        assert!(store.get("s").is_empty());
        assert_eq!(store.session_ids(), vec!["s".to_string()]);

        store.append("s", "user", "two");
        assert_eq!(store.get("s"), vec![Turn::user("two")]);
    }

    #[test]
    fn test_clear_leaves_other_sessions_alone() {
        let store = SessionStore::new();
        store.append("a", "user", "for a");
        store.append("b", "user", "for b");

        store.clear("a");

        assert!(store.get("a").is_empty());
        assert_eq!(store.get("b"), vec![Turn::user("for b")]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_exchange_lock_is_shared_per_session() {
        let store = SessionStore::new();
        let first = store.exchange_lock("s");
        let second = store.exchange_lock("s");
        let other = store.exchange_lock("t");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn test_exchanges_do_not_interleave() {
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let lock = store.exchange_lock("shared");
                let _guard = lock.lock().await;
                store.append("shared", "user", format!("q{}", i));
                tokio::task::yield_now().await;
                store.append("shared", "assistant", format!("a{}", i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let turns = store.get("shared");
        assert_eq!(turns.len(), 16);
        for pair in turns.chunks(2) {
            let question = pair[0].content.trim_start_matches('q');
            let answer = pair[1].content.trim_start_matches('a');
            assert_eq!(pair[0].role, "user");
            assert_eq!(pair[1].role, "assistant");
            assert_eq!(question, answer);
        }
    }
}
