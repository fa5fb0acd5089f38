//! OpenAI gateways: Whisper transcription and Chat Completions reply generation.

use std::time::Duration;

use reqwest::Client;

use super::GatewayError;

mod generation;
pub mod messages;
mod transcription;

pub use generation::OpenAIGenerator;
pub use transcription::OpenAITranscriber;

/// Build the pooled HTTP client shared by the OpenAI gateways
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, GatewayError> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| GatewayError::Unavailable(format!("Failed to create HTTP client: {e}")))
}

pub(crate) fn require_api_key(api_key: String) -> Result<String, GatewayError> {
    if api_key.trim().is_empty() {
        return Err(GatewayError::Unauthorized(
            "OpenAI API key is empty".to_string(),
        ));
    }
    Ok(api_key)
}
