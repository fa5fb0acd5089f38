//! Shared fixtures for the integration tests: configuration, mock gateways and request helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;

use voice_turn_gateway::{
    ServerConfig,
    config::{AuthApiSecret, ConversationConfig, GatewayConfig},
    core::{GatewayError, ResponseGenerator, SpeechSynthesizer, TranscriptionGateway, Turn},
    routes,
    state::AppState,
};

pub const TEST_API_SECRET: &str = "test-secret-123";

/// Minimal configuration: no provider keys, no auth, rate limiting disabled
pub fn create_test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 3001,
        tls: None,
        public_url: None,
        openai_api_key: None,
        elevenlabs_api_key: None,
        twilio_account_sid: None,
        twilio_auth_token: None,
        gateways: GatewayConfig::default(),
        conversation: ConversationConfig::default(),
        audio_cache_ttl_seconds: 600,
        audio_cache_max_entries: 100,
        allow_insecure_recording_urls: false,
        auth_api_secrets: Vec::new(),
        auth_required: false,
        cors_allowed_origins: Some("*".to_string()),
        rate_limit_requests_per_second: 100000, // Disable for tests
        rate_limit_burst_size: 100,
    }
}

pub fn create_auth_config() -> ServerConfig {
    let mut config = create_test_config();
    config.auth_required = true;
    config.auth_api_secrets = vec![AuthApiSecret {
        id: "ops".to_string(),
        secret: TEST_API_SECRET.to_string(),
    }];
    config
}

/// Replies with `You said: {utterance}` and counts calls
#[derive(Default)]
pub struct EchoGenerator {
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl EchoGenerator {
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(&self, _history: &[Turn], utterance: &str) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("You said: {utterance}"))
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Always fails with the given error
pub struct FailingGenerator(pub GatewayError);

#[async_trait]
impl ResponseGenerator for FailingGenerator {
    async fn generate(&self, _history: &[Turn], _utterance: &str) -> Result<String, GatewayError> {
        Err(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Returns a fixed transcript for any audio
pub struct FixedTranscriber {
    pub text: String,
    pub calls: AtomicUsize,
}

impl FixedTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TranscriptionGateway for FixedTranscriber {
    async fn transcribe(
        &self,
        audio: Bytes,
        _language: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if audio.is_empty() {
            return Err(GatewayError::InvalidInput("audio is empty".to_string()));
        }
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Produces a fake MP3 payload
pub struct StaticSynthesizer;

pub const FAKE_MP3: &[u8] = b"ID3\x03\x00fake-mp3";

#[async_trait]
impl SpeechSynthesizer for StaticSynthesizer {
    async fn synthesize(&self, _text: &str, _voice_id: &str) -> Result<Bytes, GatewayError> {
        Ok(Bytes::from_static(FAKE_MP3))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Router over state with an echo generator and no other gateways
pub fn echo_app(config: ServerConfig) -> (Router, Arc<AppState>, Arc<EchoGenerator>) {
    let generator = Arc::new(EchoGenerator::default());
    let state = AppState::builder(config)
        .generator(generator.clone())
        .build()
        .unwrap();
    (routes::create_router(state.clone()), state, generator)
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
