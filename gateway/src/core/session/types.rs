use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by session store mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session was never created or has been evicted
    #[error("session not found: {0}")]
    NotFound(String),

    /// The session has ended and no longer accepts turns
    #[error("session has ended: {0}")]
    Ended(String),
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Caller,
    System,
}

/// One utterance in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    /// Milliseconds since the Unix epoch, strictly increasing within a session
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Conversation state for one call leg
///
/// Sessions are owned by the store. Everything outside the store works on
/// cloned snapshots.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    turns: Vec<Turn>,
    status: SessionStatus,
    consecutive_empty: u32,
    last_activity: Instant,
}

impl Session {
    pub fn new(id: impl Into<String>, now: Instant) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            status: SessionStatus::Active,
            consecutive_empty: 0,
            last_activity: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Most recent system utterance, if any
    pub fn last_system_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::System)
            .map(|turn| turn.text.as_str())
    }

    /// True when the session has been idle for longer than `ttl` at `now`
    pub fn is_idle(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) > ttl
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Append a turn stamped with the wall clock, bumping ties so timestamps stay strictly increasing
    pub(crate) fn push_turn(
        &mut self,
        role: Role,
        text: &str,
        now: Instant,
    ) -> Result<(), SessionError> {
        if self.is_ended() {
            return Err(SessionError::Ended(self.id.clone()));
        }

        let wall_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let timestamp_ms = match self.turns.last() {
            Some(last) if wall_ms <= last.timestamp_ms => last.timestamp_ms + 1,
            _ => wall_ms,
        };

        self.turns.push(Turn {
            role,
            text: text.to_string(),
            timestamp_ms,
        });
        self.touch(now);
        Ok(())
    }

    /// Update the consecutive-empty counter and return its new value
    pub(crate) fn record_silence(&mut self, empty: bool, now: Instant) -> u32 {
        if empty {
            self.consecutive_empty = self.consecutive_empty.saturating_add(1);
        } else {
            self.consecutive_empty = 0;
        }
        self.touch(now);
        self.consecutive_empty
    }

    /// Mark the session ended. Returns false if it already was.
    pub(crate) fn mark_ended(&mut self, now: Instant) -> bool {
        if self.is_ended() {
            return false;
        }
        self.status = SessionStatus::Ended;
        self.touch(now);
        true
    }
}
