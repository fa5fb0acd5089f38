use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::messages::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, error_detail};
use super::{build_http_client, require_api_key};
use crate::config::GatewayConfig;
use crate::core::gateway::{GatewayError, ResponseGenerator};
use crate::core::session::Turn;

/// Reply generation over OpenAI `POST /v1/chat/completions`.
pub struct OpenAIGenerator {
    http_client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
    timeout: Duration,
}

impl OpenAIGenerator {
    pub fn new(api_key: String, config: &GatewayConfig) -> Result<Self, GatewayError> {
        let timeout = config.generation_timeout();
        Ok(Self {
            http_client: build_http_client(timeout)?,
            api_key: require_api_key(api_key)?,
            endpoint: format!(
                "{}/v1/chat/completions",
                config.openai_base_url.trim_end_matches('/')
            ),
            model: config.generation_model.clone(),
            max_tokens: config.generation_max_tokens,
            system_prompt: config.system_prompt.clone(),
            timeout,
        })
    }

    fn build_request<'a>(
        &'a self,
        history: &'a [Turn],
        utterance: &'a str,
    ) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(history.iter().map(ChatMessage::from_turn));
        messages.push(ChatMessage::user(utterance));

        ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl ResponseGenerator for OpenAIGenerator {
    async fn generate(&self, history: &[Turn], utterance: &str) -> Result<String, GatewayError> {
        let request = self.build_request(history, utterance);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            "Requesting chat completion"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
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

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::Unavailable(format!("Unexpected chat completion response: {e}"))
        })?;

        parsed
            .reply()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::InvalidInput("generator returned an empty reply".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai-chat"
    }
}
