//! Open quiz sessions
//!
//! At most one session exists per (topic, keyword). Opening is an atomic
//! check-and-insert; the returned guard releases the session when dropped,
//! so every exit path of a quiz request (backend failure, store failure,
//! display closed) releases exactly once. Each opening gets its own
//! generation, so a stale guard never releases a newer session.

use crate::types::SessionKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Lifecycle of an open session. Idle sessions are simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the quiz backend
    Requesting,
    /// Quiz is on screen, waiting for the viewer to close
    AwaitingCompletion,
}

/// Registry of open quiz sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    open: Mutex<HashMap<SessionKey, OpenSession>>,
    generations: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct OpenSession {
    state: SessionState,
    generation: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, OpenSession>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self, key: &SessionKey) -> bool {
        self.sessions().contains_key(key)
    }

    pub fn state(&self, key: &SessionKey) -> Option<SessionState> {
        self.sessions().get(key).map(|s| s.state)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Open a session unless one is already open for `key`.
    ///
    /// Only reachable from Idle; returns `None` when the key is Requesting
    /// or AwaitingCompletion.
    pub(crate) fn try_open(self: &Arc<Self>, key: SessionKey) -> Option<SessionGuard> {
        let mut sessions = self.sessions();
        if sessions.contains_key(&key) {
            return None;
        }
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        sessions.insert(
            key.clone(),
            OpenSession {
                state: SessionState::Requesting,
                generation,
            },
        );
        debug!("Quiz session opened: {}", key);

        Some(SessionGuard {
            registry: Arc::clone(self),
            key,
            generation,
        })
    }

    fn advance(&self, key: &SessionKey, generation: u64, state: SessionState) {
        if let Some(current) = self.sessions().get_mut(key) {
            if current.generation == generation {
                current.state = state;
            }
        }
    }

    /// Release the session for `key` if it is still the given generation.
    /// Releasing an absent or newer session is a no-op.
    fn release(&self, key: &SessionKey, generation: u64) -> bool {
        let mut sessions = self.sessions();
        let owned = sessions
            .get(key)
            .is_some_and(|open| open.generation == generation);
        if owned {
            sessions.remove(key);
            debug!("Quiz session released: {}", key);
        }
        owned
    }
}

/// Ownership of one open session; dropping it returns the key to Idle
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    key: SessionKey,
    generation: u64,
}

impl SessionGuard {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Requesting -> AwaitingCompletion
    pub fn mark_displayed(&self) {
        self.registry
            .advance(&self.key, self.generation, SessionState::AwaitingCompletion);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.generation);
    }
}
