//! ElevenLabs text-to-speech gateway.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GatewayError, SpeechSynthesizer};
use crate::config::GatewayConfig;

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_id: Option<&'a str>,
}

/// ElevenLabs error bodies carry either a string or an object under `detail`
#[derive(Debug, Deserialize)]
struct ElevenLabsErrorResponse {
    detail: serde_json::Value,
}

fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ElevenLabsErrorResponse>(body) {
        Ok(parsed) => match parsed.detail {
            serde_json::Value::String(message) => message,
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| serde_json::Value::Object(map).to_string()),
            other => other.to_string(),
        },
        Err(_) => body.chars().take(200).collect(),
    }
}

/// Speech synthesis over ElevenLabs `POST /v1/text-to-speech/{voice_id}`.
pub struct ElevenLabsSynthesizer {
    http_client: Client,
    api_key: String,
    base_url: String,
    model_id: Option<String>,
    timeout: Duration,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: String, config: &GatewayConfig) -> Result<Self, GatewayError> {
        if api_key.trim().is_empty() {
            return Err(GatewayError::Unauthorized(
                "ElevenLabs API key is empty".to_string(),
            ));
        }

        let timeout = config.synthesis_timeout();
        let http_client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                GatewayError::Unavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            api_key,
            base_url: config.elevenlabs_base_url.trim_end_matches('/').to_string(),
            model_id: config.synthesis_model_id.clone(),
            timeout,
        })
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{voice_id}", self.base_url)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, GatewayError> {
        if text.trim().is_empty() {
            return Err(GatewayError::InvalidInput("text is empty".to_string()));
        }
        if voice_id.is_empty() || voice_id.contains('/') {
            return Err(GatewayError::InvalidInput(format!(
                "invalid voice id '{voice_id}'"
            )));
        }

        debug!(voice_id, chars = text.len(), "Requesting speech synthesis");

        let response = self
            .http_client
            .post(self.endpoint(voice_id))
            .header("xi-api-key", &self.api_key)
            .header(ACCEPT, "audio/mpeg")
            .json(&SynthesisRequest {
                text,
                model_id: self.model_id.as_deref(),
            })
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(
                status,
                &headers,
                error_detail(&body),
            ));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        if audio.is_empty() {
            return Err(GatewayError::Unavailable(
                "synthesis returned no audio".to_string(),
            ));
        }
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "elevenlabs"
    }
}
