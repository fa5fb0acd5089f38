use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use super::messages::{AudioInputFormat, TranscriptionResponse, error_detail};
use super::{build_http_client, require_api_key};
use crate::config::GatewayConfig;
use crate::core::gateway::{GatewayError, TranscriptionGateway};

/// Whisper rejects uploads above 25 MB
const MAX_FILE_SIZE_BYTES: usize = 25 * 1024 * 1024;

/// OpenAI Whisper transcription over `POST /v1/audio/transcriptions`.
pub struct OpenAITranscriber {
    http_client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OpenAITranscriber {
    pub fn new(api_key: String, config: &GatewayConfig) -> Result<Self, GatewayError> {
        let timeout = config.transcription_timeout();
        Ok(Self {
            http_client: build_http_client(timeout)?,
            api_key: require_api_key(api_key)?,
            endpoint: format!(
                "{}/v1/audio/transcriptions",
                config.openai_base_url.trim_end_matches('/')
            ),
            model: config.transcription_model.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl TranscriptionGateway for OpenAITranscriber {
    async fn transcribe(
        &self,
        audio: Bytes,
        language: Option<&str>,
    ) -> Result<String, GatewayError> {
        if audio.is_empty() {
            return Err(GatewayError::InvalidInput("audio is empty".to_string()));
        }
        if audio.len() > MAX_FILE_SIZE_BYTES {
            return Err(GatewayError::InvalidInput(format!(
                "audio ({} bytes) exceeds maximum file size ({MAX_FILE_SIZE_BYTES} bytes)",
                audio.len()
            )));
        }

        let format = AudioInputFormat::detect(&audio);
        info!(
            bytes = audio.len(),
            mime = format.mime_type(),
            "Sending audio to OpenAI Whisper API"
        );

        let file_part = Part::bytes(audio.to_vec())
            .file_name(format.file_name())
            .mime_str(format.mime_type())
            .map_err(|e| GatewayError::InvalidInput(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        // Whisper expects ISO-639-1, so "en-US" is sent as "en"
        if let Some(language) = language
            && let Some(code) = language.split(['-', '_']).next()
            && !code.is_empty()
        {
            form = form.text("language", code.to_ascii_lowercase());
        }

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            return Err(GatewayError::from_status(
                status,
                &headers,
                error_detail(&body),
            ));
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::Unavailable(format!("Unexpected transcription response: {e}"))
        })?;

        let text = parsed.text.trim().to_string();
        debug!(chars = text.len(), "Transcription complete");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "openai-whisper"
    }
}
