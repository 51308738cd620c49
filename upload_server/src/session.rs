use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Uploading,
    Completed,
    Aborted,
}

/// One logical file transfer as the orchestrator tracks it: the client's
/// file id, the derived storage key, and how recently the client touched it.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub file_id: String,
    pub key: String,
    pub state: SessionState,
    last_touched: Instant,
}

impl UploadSession {
    fn new(file_id: String, key: String) -> Self {
        Self {
            file_id,
            key,
            state: SessionState::Created,
            last_touched: Instant::now(),
        }
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.last_touched.elapsed() > ttl
    }
}

/// In-memory `upload_id -> UploadSession` table.
///
/// Every chunk/complete/abort request is validated against this table, so a
/// stale or fabricated `upload_id` fails here instead of leaking through to
/// the backend. Idle sessions past the TTL are handed to the expiry sweep,
/// which aborts their backend uploads.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, UploadSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, upload_id: &str, file_id: &str, key: &str) {
        self.sessions
            .write()
            .insert(upload_id.to_owned(), UploadSession::new(file_id.to_owned(), key.to_owned()));
    }

    /// Checks that `upload_id` names a live session owned by `file_id`,
    /// refreshes its idle clock, and returns the session's storage key.
    pub fn validate(&self, upload_id: &str, file_id: &str) -> Result<String> {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get_mut(upload_id) else {
            return Err(ServerError::Validation(format!("unknown upload_id: {upload_id}")));
        };
        if session.expired(self.ttl) {
            sessions.remove(upload_id);
            return Err(ServerError::Validation(format!("upload session expired: {upload_id}")));
        }
        if session.file_id != file_id {
            return Err(ServerError::Validation(format!(
                "file_id {file_id} does not match upload session {upload_id}"
            )));
        }
        session.last_touched = Instant::now();
        if session.state == SessionState::Created {
            session.state = SessionState::Uploading;
        }
        Ok(session.key.clone())
    }

    /// Removes the session, recording its terminal state.
    pub fn finish(&self, upload_id: &str, state: SessionState) -> Option<UploadSession> {
        let mut session = self.sessions.write().remove(upload_id)?;
        session.state = state;
        Some(session)
    }

    /// Drains every session idle past the TTL; the caller aborts their
    /// backend uploads.
    pub fn take_expired(&self) -> Vec<String> {
        let mut sessions = self.sessions.write();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.expired(self.ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }

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
    fn test_validate_and_touch() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.insert("u1", "f1", "f1.bin");

        assert_eq!(store.validate("u1", "f1").unwrap(), "f1.bin");
        assert!(store.validate("u1", "other").is_err());
        assert!(store.validate("missing", "f1").is_err());
    }

    #[test]
    fn test_finish_removes() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.insert("u1", "f1", "f1.bin");

        let session = store.finish("u1", SessionState::Completed).unwrap();
        assert_eq!(session.state, SessionState::Completed);
        assert!(store.is_empty());
        assert!(store.finish("u1", SessionState::Completed).is_none());
    }

    #[test]
    fn test_expiry() {
        let store = SessionStore::new(Duration::from_millis(0));
        store.insert("u1", "f1", "f1.bin");

        std::thread::sleep(Duration::from_millis(5));
        assert!(store.validate("u1", "f1").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_take_expired() {
        let store = SessionStore::new(Duration::from_millis(0));
        store.insert("u1", "f1", "f1.bin");
        store.insert("u2", "f2", "f2.bin");

        std::thread::sleep(Duration::from_millis(5));
        let mut expired = store.take_expired();
        expired.sort();
        assert_eq!(expired, vec!["u1".to_owned(), "u2".to_owned()]);
        assert!(store.is_empty());
    }
}
