use serde::Serialize;
use thiserror::Error;

use crate::core::session::Session;

/// Conversation state of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    /// No turns yet
    Greeting,
    /// Waiting for the caller
    Listening,
    /// A reply is being produced
    Responding,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    Greeted,
    CallerSpoke,
    ReplyReady,
    ReplyFailed,
    EndRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid turn transition: {event:?} in state {state:?}")]
pub struct InvalidTransition {
    pub state: TurnState,
    pub event: TurnEvent,
}

impl TurnState {
    /// State implied by a stored session between turns
    pub fn of(session: &Session) -> Self {
        if session.is_ended() {
            TurnState::Ended
        } else if session.turns().is_empty() {
            TurnState::Greeting
        } else {
            TurnState::Listening
        }
    }

    pub fn next(self, event: TurnEvent) -> Result<TurnState, InvalidTransition> {
        use TurnEvent::*;
        use TurnState::*;

        match (self, event) {
            (Ended, _) => Err(InvalidTransition { state: self, event }),
            (_, EndRequested) => Ok(Ended),
            (Greeting, Greeted) => Ok(Listening),
            (Greeting | Listening, CallerSpoke) => Ok(Responding),
            (Responding, ReplyReady | ReplyFailed) => Ok(Listening),
            _ => Err(InvalidTransition { state: self, event }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Greeting => "greeting",
            TurnState::Listening => "listening",
            TurnState::Responding => "responding",
            TurnState::Ended => "ended",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Role;
    use std::time::Instant;

    #[test]
    fn test_happy_path_transitions() {
        let state = TurnState::Greeting;
        let state = state.next(TurnEvent::Greeted).unwrap();
        assert_eq!(state, TurnState::Listening);

        let state = state.next(TurnEvent::CallerSpoke).unwrap();
        assert_eq!(state, TurnState::Responding);

        assert_eq!(
            state.next(TurnEvent::ReplyReady).unwrap(),
            TurnState::Listening
        );
        assert_eq!(
            state.next(TurnEvent::ReplyFailed).unwrap(),
            TurnState::Listening
        );
    }

    #[test]
    fn test_caller_can_speak_before_greeting() {
        assert_eq!(
            TurnState::Greeting.next(TurnEvent::CallerSpoke).unwrap(),
            TurnState::Responding
        );
    }

    #[test]
    fn test_end_from_any_live_state() {
        for state in [
            TurnState::Greeting,
            TurnState::Listening,
            TurnState::Responding,
        ] {
            assert_eq!(state.next(TurnEvent::EndRequested).unwrap(), TurnState::Ended);
        }
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        assert!(TurnState::Listening.next(TurnEvent::ReplyReady).is_err());
        assert!(TurnState::Responding.next(TurnEvent::CallerSpoke).is_err());
        assert!(TurnState::Listening.next(TurnEvent::Greeted).is_err());

        let err = TurnState::Ended.next(TurnEvent::EndRequested).unwrap_err();
        assert_eq!(err.state, TurnState::Ended);
    }

    #[test]
    fn test_state_of_session() {
        let now = Instant::now();
        let mut session = Session::new("CA1", now);
        assert_eq!(TurnState::of(&session), TurnState::Greeting);

        session.push_turn(Role::System, "Hello", now).unwrap();
        assert_eq!(TurnState::of(&session), TurnState::Listening);

        session.mark_ended(now);
        assert_eq!(TurnState::of(&session), TurnState::Ended);
    }
}
