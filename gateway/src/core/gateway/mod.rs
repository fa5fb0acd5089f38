//! External collaborators of the turn pipeline
//!
//! Each gateway exposes a single request/response operation behind a trait so
//! the controller and handlers can be driven by mocks in tests. All failures are
//! reported through [`GatewayError`] and treated as recoverable by callers.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use thiserror::Error;

use crate::core::session::Turn;

pub mod elevenlabs;
pub mod openai;
pub mod recording;

pub use elevenlabs::ElevenLabsSynthesizer;
pub use openai::{OpenAIGenerator, OpenAITranscriber};
pub use recording::RecordingFetcher;

/// Failure taxonomy shared by every gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Network failure, 5xx or an unexpected response
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the request payload
    #[error("invalid gateway input: {0}")]
    InvalidInput(String),

    #[error("gateway rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("gateway call timed out after {0:?}")]
    Timeout(Duration),

    /// Credentials missing or rejected by the provider
    #[error("gateway unauthorized: {0}")]
    Unauthorized(String),
}

impl GatewayError {
    /// Classify a non-success HTTP response
    pub fn from_status(status: StatusCode, headers: &HeaderMap, detail: String) -> Self {
        match status.as_u16() {
            429 => GatewayError::RateLimited {
                retry_after: parse_retry_after(headers),
            },
            400 | 413 | 415 | 422 => GatewayError::InvalidInput(format!("{status}: {detail}")),
            401 | 403 => GatewayError::Unauthorized(format!("{status}: {detail}")),
            _ => GatewayError::Unavailable(format!("{status}: {detail}")),
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn from_reqwest(err: reqwest::Error, bound: Duration) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(bound)
        } else {
            GatewayError::Unavailable(format!("request failed: {err}"))
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GatewayError::RateLimited { .. })
    }
}

/// Retry-After in its delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Bound a gateway future by `bound`, mapping elapsed time to [`GatewayError::Timeout`]
pub async fn with_timeout<T, F>(bound: Duration, fut: F) -> Result<T, GatewayError>
where
    F: std::future::Future<Output = Result<T, GatewayError>>,
{
    tokio::time::timeout(bound, fut)
        .await
        .map_err(|_| GatewayError::Timeout(bound))?
}

/// Audio bytes to text
#[async_trait]
pub trait TranscriptionGateway: Send + Sync {
    async fn transcribe(&self, audio: Bytes, language: Option<&str>)
    -> Result<String, GatewayError>;

    fn name(&self) -> &'static str;
}

/// Conversation history plus the new utterance to the next system reply
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// `history` holds the turns before `utterance`, oldest first
    async fn generate(&self, history: &[Turn], utterance: &str) -> Result<String, GatewayError>;

    fn name(&self) -> &'static str;
}

/// Text to encoded speech (audio/mpeg)
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, GatewayError>;

    fn name(&self) -> &'static str;
}
