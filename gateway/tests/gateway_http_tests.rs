//! Gateway HTTP tests
//!
//! Runs the OpenAI, ElevenLabs and recording gateways against wiremock servers
//! and checks request shape and error classification.

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voice_turn_gateway::{
    config::GatewayConfig,
    core::{GatewayError, ResponseGenerator, Role, SpeechSynthesizer, TranscriptionGateway, Turn},
    core::gateway::{ElevenLabsSynthesizer, OpenAIGenerator, OpenAITranscriber, RecordingFetcher},
};

fn gateway_config(server: &MockServer) -> GatewayConfig {
    GatewayConfig {
        openai_base_url: server.uri(),
        elevenlabs_base_url: server.uri(),
        transcription_timeout_ms: 2_000,
        generation_timeout_ms: 2_000,
        synthesis_timeout_ms: 2_000,
        ..Default::default()
    }
}

fn wav_bytes() -> Bytes {
    let mut audio = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
    audio.extend_from_slice(&[0u8; 64]);
    Bytes::from(audio)
}

fn chat_reply(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_generator_sends_history_and_parses_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("  Your balance is ten dollars.  ")))
        .expect(1)
        .mount(&server)
        .await;

    let generator = OpenAIGenerator::new("sk-test".to_string(), &gateway_config(&server)).unwrap();
    let history = vec![Turn {
        role: Role::System,
        text: "Hello! How can I help you today?".to_string(),
        timestamp_ms: 1,
    }];

    let reply = generator
        .generate(&history, "What is my balance")
        .await
        .unwrap();
    assert_eq!(reply, "Your balance is ten dollars.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"], "What is my balance");
}

#[tokio::test]
async fn test_generator_error_classification() {
    let cases: [(ResponseTemplate, fn(&GatewayError) -> bool); 3] = [
        (
            ResponseTemplate::new(429).insert_header("retry-after", "7"),
            |err| {
                *err == GatewayError::RateLimited {
                    retry_after: Some(Duration::from_secs(7)),
                }
            },
        ),
        (
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Incorrect API key provided"}})),
            |err| matches!(err, GatewayError::Unauthorized(detail) if detail.contains("Incorrect API key provided")),
        ),
        (
            ResponseTemplate::new(400).set_body_json(json!({"error": {"message": "bad request"}})),
            |err| matches!(err, GatewayError::InvalidInput(detail) if detail.contains("bad request")),
        ),
    ];

    for (template, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(template)
            .mount(&server)
            .await;

        let generator =
            OpenAIGenerator::new("sk-test".to_string(), &gateway_config(&server)).unwrap();
        let err = generator.generate(&[], "hello").await.unwrap_err();
        assert!(expected(&err), "unexpected classification: {err:?}");
    }
}

#[tokio::test]
async fn test_generator_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let generator = OpenAIGenerator::new("sk-test".to_string(), &gateway_config(&server)).unwrap();
    let err = generator.generate(&[], "hello").await.unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)));
}

#[tokio::test]
async fn test_generator_empty_reply_is_invalid_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("   ")))
        .mount(&server)
        .await;

    let generator = OpenAIGenerator::new("sk-test".to_string(), &gateway_config(&server)).unwrap();
    let err = generator.generate(&[], "hello").await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidInput(_)));
}

#[tokio::test]
async fn test_generator_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_reply("late"))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let mut config = gateway_config(&server);
    config.generation_timeout_ms = 100;

    let generator = OpenAIGenerator::new("sk-test".to_string(), &config).unwrap();
    let err = generator.generate(&[], "hello").await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout(_)));
}

#[tokio::test]
async fn test_transcriber_posts_multipart_and_trims_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": " check my order "})))
        .expect(1)
        .mount(&server)
        .await;

    let transcriber =
        OpenAITranscriber::new("sk-test".to_string(), &gateway_config(&server)).unwrap();
    let text = transcriber
        .transcribe(wav_bytes(), Some("en-US"))
        .await
        .unwrap();
    assert_eq!(text, "check my order");

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("whisper-1"));
    assert!(body.contains("name=\"language\""));
    assert!(body.contains("audio/wav"));
}

#[tokio::test]
async fn test_transcriber_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let transcriber =
        OpenAITranscriber::new("sk-test".to_string(), &gateway_config(&server)).unwrap();
    let err = transcriber.transcribe(wav_bytes(), None).await.unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn test_synthesizer_returns_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/alloy"))
        .and(header("xi-api-key", "el-test"))
        .and(header("accept", "audio/mpeg"))
        .and(body_partial_json(json!({"text": "Hello there"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(b"ID3fake".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer =
        ElevenLabsSynthesizer::new("el-test".to_string(), &gateway_config(&server)).unwrap();
    let audio = synthesizer.synthesize("Hello there", "alloy").await.unwrap();
    assert_eq!(audio.as_ref(), b"ID3fake");
}

#[tokio::test]
async fn test_synthesizer_error_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/alloy"))
        .respond_with(ResponseTemplate::new(401).set_body_json(
            json!({"detail": {"status": "invalid_api_key", "message": "Invalid API key"}}),
        ))
        .mount(&server)
        .await;

    let synthesizer =
        ElevenLabsSynthesizer::new("el-bad".to_string(), &gateway_config(&server)).unwrap();
    let err = synthesizer.synthesize("Hello", "alloy").await.unwrap_err();
    assert!(
        matches!(err, GatewayError::Unauthorized(ref detail) if detail.contains("Invalid API key"))
    );
}

#[tokio::test]
async fn test_recording_fetch_in_insecure_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2010-04-01/Accounts/AC1/Recordings/RE1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_bytes().to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = RecordingFetcher::new(
        Some(("AC1".to_string(), "token".to_string())),
        true,
        Duration::from_secs(2),
    )
    .unwrap();

    let url = format!("{}/2010-04-01/Accounts/AC1/Recordings/RE1", server.uri());
    let audio = fetcher.fetch(&url).await.unwrap();
    assert_eq!(audio, wav_bytes());

    // Credentials are only attached for Twilio hosts
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_recording_fetch_rejects_local_url_in_strict_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = RecordingFetcher::new(None, false, Duration::from_secs(2)).unwrap();
    let err = fetcher
        .fetch(&format!("{}/recording.wav", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidInput(_)));
}

#[tokio::test]
async fn test_recording_fetch_does_not_follow_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "http://169.254.169.254/latest"),
        )
        .mount(&server)
        .await;

    let fetcher = RecordingFetcher::new(None, true, Duration::from_secs(2)).unwrap();
    let err = fetcher
        .fetch(&format!("{}/moved", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)));
}
