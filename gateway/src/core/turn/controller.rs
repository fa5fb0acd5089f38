use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::intent::EndOfCallDetector;
use super::state::{InvalidTransition, TurnEvent, TurnState};
use crate::config::ConversationConfig;
use crate::core::gateway::{GatewayError, ResponseGenerator, with_timeout};
use crate::core::session::{Role, Session, SessionError, SessionLocks, SessionStore, Turn};

/// Longest pause honoured after a rate-limited generation
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Canned system utterances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReplies {
    pub greeting: String,
    pub closing: String,
    pub fallback: String,
    pub reprompt: String,
}

impl From<&ConversationConfig> for TurnReplies {
    fn from(config: &ConversationConfig) -> Self {
        Self {
            greeting: config.greeting_text.clone(),
            closing: config.closing_text.clone(),
            fallback: config.fallback_text.clone(),
            reprompt: config.reprompt_text.clone(),
        }
    }
}

/// Result of one controller invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// System utterance to speak next
    pub reply: String,
    /// False when the call should be hung up after the reply
    pub continue_call: bool,
    pub state: TurnState,
}

impl TurnOutcome {
    fn speak(reply: &str, state: TurnState) -> Self {
        Self {
            reply: reply.to_string(),
            continue_call: state != TurnState::Ended,
            state,
        }
    }
}

#[derive(Debug, Error)]
enum TurnError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Drives one caller turn at a time per session.
///
/// Every public operation takes the session's turn lock first, so turns for
/// the same call never interleave while different calls run independently.
pub struct TurnController {
    store: Arc<dyn SessionStore>,
    locks: Arc<SessionLocks>,
    generator: Option<Arc<dyn ResponseGenerator>>,
    detector: EndOfCallDetector,
    replies: TurnReplies,
    generation_timeout: Duration,
    backoff_until: Mutex<Option<Instant>>,
}

impl TurnController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        locks: Arc<SessionLocks>,
        generator: Option<Arc<dyn ResponseGenerator>>,
        conversation: &ConversationConfig,
        generation_timeout: Duration,
    ) -> Result<Self, regex::Error> {
        let detector = EndOfCallDetector::new(
            &conversation.goodbye_phrases,
            conversation.max_empty_turns,
        )?;

        Ok(Self {
            store,
            locks,
            generator,
            detector,
            replies: TurnReplies::from(conversation),
            generation_timeout,
            backoff_until: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn locks(&self) -> &Arc<SessionLocks> {
        &self.locks
    }

    pub fn replies(&self) -> &TurnReplies {
        &self.replies
    }

    /// Snapshot of a live session
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.store.get(session_id).await
    }

    /// Process one caller utterance and decide the next system utterance.
    ///
    /// Gateway failures never surface here: they produce the fallback reply
    /// with the call kept open and only the caller turn recorded.
    pub async fn handle_utterance(&self, session_id: &str, caller_text: &str) -> TurnOutcome {
        let _guard = self.locks.acquire(session_id).await;

        let outcome = match self.run_turn(session_id, caller_text.trim()).await {
            Ok(outcome) => outcome,
            Err(TurnError::Session(SessionError::Ended(_))) => {
                TurnOutcome::speak(&self.replies.closing, TurnState::Ended)
            }
            Err(TurnError::Session(SessionError::NotFound(_))) => {
                warn!(session_id, "Session disappeared during turn");
                TurnOutcome::speak(&self.replies.fallback, TurnState::Listening)
            }
            Err(TurnError::Transition(e)) => {
                error!(session_id, error = %e, "Turn state machine rejected transition");
                TurnOutcome::speak(&self.replies.fallback, TurnState::Listening)
            }
        };

        info!(
            session_id,
            state = outcome.state.as_str(),
            continue_call = outcome.continue_call,
            "Turn handled"
        );
        outcome
    }

    async fn run_turn(&self, session_id: &str, text: &str) -> Result<TurnOutcome, TurnError> {
        let session = self.store.get_or_create(session_id).await;
        let state = TurnState::of(&session);
        if state == TurnState::Ended {
            return Ok(TurnOutcome::speak(&self.replies.closing, TurnState::Ended));
        }

        let state = state.next(TurnEvent::CallerSpoke)?;
        let session = self.append_caller(session_id, text).await?;
        let empty = text.is_empty();
        let consecutive_empty = self.store.record_silence(session_id, empty).await?;

        let silence_limit = empty && self.detector.silence_limit_reached(consecutive_empty);
        if silence_limit || self.detector.is_goodbye(text) {
            debug!(session_id, silence_limit, "End of call requested");
            return self.finish(session_id, state).await;
        }

        if empty {
            self.store
                .append_turn(session_id, Role::System, &self.replies.reprompt)
                .await?;
            let state = state.next(TurnEvent::ReplyReady)?;
            return Ok(TurnOutcome::speak(&self.replies.reprompt, state));
        }

        // The caller turn just appended is the last one
        let history = &session.turns()[..session.turns().len().saturating_sub(1)];
        match self.generate(session_id, history, text).await {
            Ok(reply) => {
                self.store
                    .append_turn(session_id, Role::System, &reply)
                    .await?;
                let state = state.next(TurnEvent::ReplyReady)?;
                Ok(TurnOutcome::speak(&reply, state))
            }
            Err(e) => {
                warn!(session_id, error = %e, "Reply generation failed, using fallback");
                let state = state.next(TurnEvent::ReplyFailed)?;
                Ok(TurnOutcome::speak(&self.replies.fallback, state))
            }
        }
    }

    async fn append_caller(&self, session_id: &str, text: &str) -> Result<Session, SessionError> {
        match self
            .store
            .append_turn(session_id, Role::Caller, text)
            .await
        {
            Err(SessionError::NotFound(_)) => {
                debug!(session_id, "Session evicted mid-turn, recreating");
                self.store.get_or_create(session_id).await;
                self.store
                    .append_turn(session_id, Role::Caller, text)
                    .await
            }
            other => other,
        }
    }

    async fn finish(&self, session_id: &str, state: TurnState) -> Result<TurnOutcome, TurnError> {
        self.store
            .append_turn(session_id, Role::System, &self.replies.closing)
            .await?;
        self.store.end(session_id).await;
        let state = state.next(TurnEvent::EndRequested)?;
        Ok(TurnOutcome::speak(&self.replies.closing, state))
    }

    async fn generate(
        &self,
        session_id: &str,
        history: &[Turn],
        text: &str,
    ) -> Result<String, GatewayError> {
        let Some(generator) = &self.generator else {
            return Err(GatewayError::Unavailable(
                "no response generator configured".to_string(),
            ));
        };

        if let Some(remaining) = self.backoff_remaining() {
            debug!(session_id, ?remaining, "Generator in rate-limit backoff");
            return Err(GatewayError::RateLimited {
                retry_after: Some(remaining),
            });
        }

        let result = with_timeout(self.generation_timeout, generator.generate(history, text)).await;

        if let Err(GatewayError::RateLimited { retry_after }) = &result {
            let pause = retry_after.unwrap_or(DEFAULT_BACKOFF).min(MAX_BACKOFF);
            *self.backoff_until.lock() = Some(Instant::now() + pause);
            warn!(
                generator = generator.name(),
                ?pause,
                "Generator rate limited, backing off"
            );
        }
        result
    }

    fn backoff_remaining(&self) -> Option<Duration> {
        let mut backoff = self.backoff_until.lock();
        match *backoff {
            Some(until) => {
                let now = Instant::now();
                if until > now {
                    Some(until - now)
                } else {
                    *backoff = None;
                    None
                }
            }
            None => None,
        }
    }

    /// Speak the greeting on first contact.
    ///
    /// A fresh session records the greeting as its first system turn. Later
    /// calls repeat the last system utterance without appending anything.
    pub async fn greet(&self, session_id: &str) -> TurnOutcome {
        let _guard = self.locks.acquire(session_id).await;

        let session = self.store.get_or_create(session_id).await;
        let state = TurnState::of(&session);

        let outcome = match state {
            TurnState::Ended => TurnOutcome::speak(&self.replies.closing, TurnState::Ended),
            TurnState::Greeting => {
                match self
                    .store
                    .append_turn(session_id, Role::System, &self.replies.greeting)
                    .await
                {
                    Ok(_) => TurnOutcome::speak(
                        &self.replies.greeting,
                        state.next(TurnEvent::Greeted).unwrap_or(TurnState::Listening),
                    ),
                    Err(SessionError::Ended(_)) => {
                        TurnOutcome::speak(&self.replies.closing, TurnState::Ended)
                    }
                    Err(SessionError::NotFound(_)) => {
                        // Evicted between the two calls; the next contact starts over
                        TurnOutcome::speak(&self.replies.greeting, TurnState::Greeting)
                    }
                }
            }
            _ => {
                let reply = session
                    .last_system_text()
                    .unwrap_or(&self.replies.greeting);
                TurnOutcome::speak(reply, TurnState::Listening)
            }
        };

        debug!(session_id, state = outcome.state.as_str(), "Greeting handled");
        outcome
    }

    /// Entry point for a telephony contact that may or may not carry an utterance.
    ///
    /// No utterance on a fresh session greets the caller. No utterance later in
    /// the call counts as an empty turn.
    pub async fn handle_contact(&self, session_id: &str, utterance: Option<&str>) -> TurnOutcome {
        match utterance {
            Some(text) => self.handle_utterance(session_id, text).await,
            None => {
                let fresh = self
                    .store
                    .get(session_id)
                    .await
                    .map(|session| TurnState::of(&session) == TurnState::Greeting)
                    .unwrap_or(true);
                if fresh {
                    self.greet(session_id).await
                } else {
                    self.handle_utterance(session_id, "").await
                }
            }
        }
    }

    /// Explicit end of call. Idempotent.
    pub async fn end_call(&self, session_id: &str) {
        let _guard = self.locks.acquire(session_id).await;
        self.store.end(session_id).await;
        info!(session_id, "Call ended");
    }
}
