//! Trait abstraction for session storage.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{Role, Session, SessionError};

/// Storage backend for per-call conversation sessions.
///
/// Each method is atomic per session id. Implementations hand out snapshots;
/// callers never hold a reference into the store across an await point.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Return the live session or create an empty one.
    ///
    /// A session idle for longer than the TTL counts as absent and is replaced.
    async fn get_or_create(&self, session_id: &str) -> Session;

    /// Read-only snapshot. Expired sessions read as absent.
    async fn get(&self, session_id: &str) -> Option<Session>;

    /// Append a turn and refresh last activity.
    ///
    /// Fails with [`SessionError::NotFound`] when the session has been evicted
    /// and with [`SessionError::Ended`] when it no longer accepts turns.
    async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Session, SessionError>;

    /// Update the consecutive empty-turn counter and return the new count.
    async fn record_silence(&self, session_id: &str, empty: bool) -> Result<u32, SessionError>;

    /// Mark the session ended. Ending an ended or absent session is a no-op.
    async fn end(&self, session_id: &str);

    /// Remove sessions idle longer than the TTL, returning how many were removed.
    async fn evict_idle(&self) -> usize;

    /// Number of tracked sessions, including expired ones not yet evicted.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ttl(&self) -> Duration;
}
