use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::KernelSession;

/// Live sessions keyed by kernel id.
///
/// At most one session exists per kernel id, even when attaches race.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<KernelSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `config.kernel_id`, creating it on first use.
    ///
    /// When the session already exists the supplied key and session id are
    /// ignored.
    pub fn attach(&self, config: SessionConfig) -> Result<Arc<KernelSession>> {
        if let Some(existing) = self.get(&config.kernel_id) {
            return Ok(existing);
        }

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match sessions.entry(config.kernel_id.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let session = Arc::new(KernelSession::new(config)?);
                tracing::info!(kernel_id = session.kernel_id(), "kernel attached");
                Ok(Arc::clone(entry.insert(session)))
            }
        }
    }

    pub fn get(&self, kernel_id: &str) -> Option<Arc<KernelSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kernel_id)
            .cloned()
    }

    /// Remove and close a session. Its routers stop dispatching.
    pub fn detach(&self, kernel_id: &str) -> Option<Arc<KernelSession>> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(kernel_id)?;
        removed.close();
        tracing::info!(kernel_id, "kernel detached");
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attached kernel ids, sorted.
    pub fn kernel_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::error::SessionError;

    #[test]
    fn attach_is_idempotent() {
        let registry = SessionRegistry::new();
        let first = registry
            .attach(SessionConfig::new("k1", "S1", "abc123"))
            .unwrap();
        let second = registry
            .attach(SessionConfig::new("k1", "S2", "other"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.session_id(), "S1");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn racing_attaches_share_one_session() {
        let registry = Arc::new(SessionRegistry::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .attach(SessionConfig::new("k1", "S1", "abc123"))
                        .unwrap()
                })
            })
            .collect();

        let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for session in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], session));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_config_is_not_registered() {
        let registry = SessionRegistry::new();
        let err = registry
            .attach(SessionConfig::new("k1", "", "abc123"))
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn detach_closes_session() {
        let registry = SessionRegistry::new();
        let session = registry
            .attach(SessionConfig::new("k1", "S1", "abc123"))
            .unwrap();
        registry
            .attach(SessionConfig::new("k2", "S2", "abc123"))
            .unwrap();
        assert_eq!(registry.kernel_ids(), vec!["k1", "k2"]);

        let removed = registry.detach("k1").unwrap();
        assert!(Arc::ptr_eq(&removed, &session));
        assert!(session.is_closed());
        assert!(registry.get("k1").is_none());
        assert!(registry.detach("k1").is_none());
        assert_eq!(registry.kernel_ids(), vec!["k2"]);
    }

    #[test]
    fn reattach_after_detach_creates_fresh_session() {
        let registry = SessionRegistry::new();
        let old = registry
            .attach(SessionConfig::new("k1", "S1", "abc123"))
            .unwrap();
        registry.detach("k1");

        let new = registry
            .attach(SessionConfig::new("k1", "S2", "abc123"))
            .unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(!new.is_closed());
        assert_eq!(new.session_id(), "S2");
    }
}
