use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use tracing::debug;

use super::store::SessionStore;
use super::types::{Role, Session, SessionError};

/// In-memory session store backed by a sharded `DashMap`.
///
/// Operations on different session ids only contend when they hash to the same
/// shard, and every shard lock is held just for the in-memory mutation.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub(crate) fn get_or_create_at(&self, session_id: &str, now: Instant) -> Session {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_idle(self.ttl, now) {
                    debug!(session_id, "Replacing expired session");
                    entry.insert(Session::new(session_id, now));
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                debug!(session_id, "Creating session");
                entry.insert(Session::new(session_id, now)).clone()
            }
        }
    }

    pub(crate) fn get_at(&self, session_id: &str, now: Instant) -> Option<Session> {
        self.sessions
            .get(session_id)
            .filter(|session| !session.is_idle(self.ttl, now))
            .map(|session| session.clone())
    }

    /// Mutable access to a live session. An expired entry is removed and reads as absent.
    fn live_mut(
        &self,
        session_id: &str,
        now: Instant,
    ) -> Result<RefMut<'_, String, Session>, SessionError> {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) if entry.get().is_idle(self.ttl, now) => {
                debug!(session_id, "Dropping expired session");
                entry.remove();
                Err(SessionError::NotFound(session_id.to_string()))
            }
            Entry::Occupied(entry) => Ok(entry.into_ref()),
            Entry::Vacant(_) => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    pub(crate) fn append_turn_at(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
        now: Instant,
    ) -> Result<Session, SessionError> {
        let mut session = self.live_mut(session_id, now)?;
        session.push_turn(role, text, now)?;
        Ok(session.clone())
    }

    pub(crate) fn record_silence_at(
        &self,
        session_id: &str,
        empty: bool,
        now: Instant,
    ) -> Result<u32, SessionError> {
        let mut session = self.live_mut(session_id, now)?;
        Ok(session.record_silence(empty, now))
    }

    pub(crate) fn end_at(&self, session_id: &str, now: Instant) {
        if let Ok(mut session) = self.live_mut(session_id, now)
            && session.mark_ended(now)
        {
            debug!(session_id, turns = session.turns().len(), "Session ended");
        }
    }

    pub(crate) fn evict_idle_at(&self, now: Instant) -> usize {
        let mut evicted = 0;
        self.sessions.retain(|_, session| {
            let keep = !session.is_idle(self.ttl, now);
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> Session {
        self.get_or_create_at(session_id, Instant::now())
    }

    async fn get(&self, session_id: &str) -> Option<Session> {
        self.get_at(session_id, Instant::now())
    }

    async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Session, SessionError> {
        self.append_turn_at(session_id, role, text, Instant::now())
    }

    async fn record_silence(&self, session_id: &str, empty: bool) -> Result<u32, SessionError> {
        self.record_silence_at(session_id, empty, Instant::now())
    }

    async fn end(&self, session_id: &str) {
        self.end_at(session_id, Instant::now())
    }

    async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
