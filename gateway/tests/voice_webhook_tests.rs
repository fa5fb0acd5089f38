//! Voice webhook end-to-end tests
//!
//! Drive `POST /voice`, `POST /voice/status` and `GET /audio/{clip}` through the
//! full router with in-process gateways (and a wiremock recording host).

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::http::{StatusCode, header};
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voice_turn_gateway::{
    core::{GatewayError, SessionStatus},
    routes,
    state::AppState,
};

use common::*;

const GATHER: &str =
    "<Gather input=\"speech\" action=\"/voice\" method=\"POST\" speechTimeout=\"auto\">";

#[tokio::test]
async fn test_first_contact_greets_and_gathers() {
    let (app, state, generator) = echo_app(create_test_config());

    let response = app
        .oneshot(form_request("/voice", "CallSid=CA100"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );

    let xml = body_string(response).await;
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>"));
    assert!(xml.contains(GATHER));
    assert!(xml.contains("<Say>Hello! How can I help you today?</Say>"));
    assert!(xml.contains("<Redirect method=\"POST\">/voice</Redirect>"));
    assert!(!xml.contains("<Hangup/>"));

    assert_eq!(generator.calls(), 0);
    let session = state.controller.session("CA100").await.unwrap();
    assert_eq!(session.turns().len(), 1);
}

#[tokio::test]
async fn test_speech_result_produces_generated_reply() {
    let (app, state, generator) = echo_app(create_test_config());

    let response = app
        .clone()
        .oneshot(form_request(
            "/voice",
            "CallSid=CA101&SpeechResult=What+is+my+balance",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_string(response).await;
    assert!(xml.contains(GATHER));
    assert!(xml.contains("<Say>You said: What is my balance</Say>"));

    assert_eq!(generator.calls(), 1);
    let session = state.controller.session("CA101").await.unwrap();
    let texts: Vec<_> = session.turns().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, ["What is my balance", "You said: What is my balance"]);
}

#[tokio::test]
async fn test_caller_text_takes_priority_over_speech_result() {
    let (app, _state, _generator) = echo_app(create_test_config());

    let response = app
        .oneshot(form_request(
            "/voice",
            "CallSid=CA102&caller_text=typed&SpeechResult=spoken",
        ))
        .await
        .unwrap();

    let xml = body_string(response).await;
    assert!(xml.contains("You said: typed"));
    assert!(!xml.contains("spoken"));
}

#[tokio::test]
async fn test_call_sid_header_fallback() {
    let (app, state, _generator) = echo_app(create_test_config());

    let mut request = form_request("/voice", "SpeechResult=hello+there");
    request
        .headers_mut()
        .insert("x-twilio-callsid", "CA-header-1".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.controller.session("CA-header-1").await.is_some());
}

#[tokio::test]
async fn test_missing_call_sid_returns_apology_with_ok() {
    let (app, state, generator) = echo_app(create_test_config());

    let response = app
        .oneshot(form_request("/voice", "SpeechResult=hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_string(response).await;
    assert!(xml.contains("<Say>Sorry, please repeat that.</Say>"));
    assert_eq!(generator.calls(), 0);
    assert!(state.store().is_empty());
}

#[tokio::test]
async fn test_non_form_body_returns_apology_with_ok() {
    let (app, state, generator) = echo_app(create_test_config());

    let response = app
        .oneshot(json_request(
            "POST",
            "/voice",
            r#"{"CallSid": "CA-json"}"#,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );
    let xml = body_string(response).await;
    assert!(xml.contains("<Say>Sorry, please repeat that.</Say>"));
    assert_eq!(generator.calls(), 0);
    assert!(state.store().is_empty());
}

#[tokio::test]
async fn test_goodbye_ends_call_with_hangup() {
    let (app, state, generator) = echo_app(create_test_config());

    app.clone()
        .oneshot(form_request("/voice", "CallSid=CA103"))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(form_request("/voice", "CallSid=CA103&SpeechResult=Ok+goodbye"))
        .await
        .unwrap();

    let xml = body_string(response).await;
    assert!(xml.contains("<Say>Thanks for calling. Goodbye!</Say><Hangup/>"));
    assert!(!xml.contains("<Gather"));
    assert_eq!(generator.calls(), 0);

    let session = state.controller.session("CA103").await.unwrap();
    assert_eq!(session.status(), SessionStatus::Ended);

    // Further contact on an ended call keeps hanging up
    let response = app
        .oneshot(form_request("/voice", "CallSid=CA103&SpeechResult=hello"))
        .await
        .unwrap();
    let xml = body_string(response).await;
    assert!(xml.contains("<Hangup/>"));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_repeated_silence_ends_call() {
    let (app, state, generator) = echo_app(create_test_config());

    app.clone()
        .oneshot(form_request("/voice", "CallSid=CA104"))
        .await
        .unwrap();

    // Silence re-enters through the <Redirect>, with no speech field at all
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(form_request("/voice", "CallSid=CA104"))
            .await
            .unwrap();
        let xml = body_string(response).await;
        assert!(xml.contains(GATHER));
        assert!(!xml.contains("<Hangup/>"));
    }

    let response = app
        .oneshot(form_request("/voice", "CallSid=CA104&SpeechResult="))
        .await
        .unwrap();
    let xml = body_string(response).await;
    assert!(xml.contains("<Say>Thanks for calling. Goodbye!</Say><Hangup/>"));

    assert_eq!(generator.calls(), 0);
    let session = state.controller.session("CA104").await.unwrap();
    assert!(session.is_ended());
}

#[tokio::test]
async fn test_generator_failure_keeps_call_open_with_fallback() {
    let state = AppState::builder(create_test_config())
        .generator(Arc::new(FailingGenerator(GatewayError::Unavailable(
            "503 Service Unavailable".to_string(),
        ))))
        .build()
        .unwrap();
    let app = routes::create_router(state.clone());

    let response = app
        .oneshot(form_request("/voice", "CallSid=CA105&SpeechResult=hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_string(response).await;
    assert!(xml.contains(GATHER));
    assert!(xml.contains("<Say>Sorry, please repeat that.</Say>"));

    let session = state.controller.session("CA105").await.unwrap();
    assert_eq!(session.turns().len(), 1);
    assert_eq!(session.turns()[0].text, "hello");
}

#[tokio::test]
async fn test_synthesized_reply_is_played_and_served() {
    let mut config = create_test_config();
    config.public_url = Some("https://voice.example.com/".to_string());

    let state = AppState::builder(config)
        .generator(Arc::new(EchoGenerator::default()))
        .synthesizer(Arc::new(StaticSynthesizer))
        .build()
        .unwrap();
    let app = routes::create_router(state);

    let response = app
        .clone()
        .oneshot(form_request("/voice", "CallSid=CA106&SpeechResult=hello"))
        .await
        .unwrap();
    let xml = body_string(response).await;

    assert!(xml.contains("action=\"https://voice.example.com/voice\""));
    let start = xml.find("<Play>").unwrap() + "<Play>".len();
    let end = xml.find("</Play>").unwrap();
    let clip_url = &xml[start..end];
    assert!(clip_url.starts_with("https://voice.example.com/audio/"));
    assert!(clip_url.ends_with(".mp3"));

    let clip_path = clip_url.trim_start_matches("https://voice.example.com");
    let response = app
        .oneshot(empty_request("GET", clip_path, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/mpeg"
    );
    assert_eq!(body_bytes(response).await.as_ref(), FAKE_MP3);
}

#[tokio::test]
async fn test_audio_clip_lookup_errors() {
    let (app, _state, _generator) = echo_app(create_test_config());

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/audio/not-a-clip", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let unknown = format!("/audio/{}.mp3", "0".repeat(32));
    let response = app
        .oneshot(empty_request("GET", &unknown, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_recording_url_is_fetched_and_transcribed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recordings/RE1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .set_body_bytes(b"RIFF\x00\x00\x00\x00WAVEfmt ".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.allow_insecure_recording_urls = true;

    let transcriber = Arc::new(FixedTranscriber::new("check my order"));
    let state = AppState::builder(config)
        .generator(Arc::new(EchoGenerator::default()))
        .transcriber(transcriber.clone())
        .build()
        .unwrap();
    let app = routes::create_router(state.clone());

    let body = format!("CallSid=CA107&RecordingUrl={}/recordings/RE1", server.uri());
    let response = app.oneshot(form_request("/voice", &body)).await.unwrap();

    let xml = body_string(response).await;
    assert!(xml.contains("<Say>You said: check my order</Say>"));
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);

    let session = state.controller.session("CA107").await.unwrap();
    assert_eq!(session.turns()[0].text, "check my order");
}

#[tokio::test]
async fn test_private_recording_url_rejected_without_touching_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let transcriber = Arc::new(FixedTranscriber::new("unused"));
    let state = AppState::builder(create_test_config())
        .generator(Arc::new(EchoGenerator::default()))
        .transcriber(transcriber.clone())
        .build()
        .unwrap();
    let app = routes::create_router(state.clone());

    let body = format!("CallSid=CA108&RecordingUrl={}/recordings/RE2", server.uri());
    let response = app.oneshot(form_request("/voice", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_string(response).await;
    assert!(xml.contains("<Say>Sorry, please repeat that.</Say>"));
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    assert!(state.controller.session("CA108").await.is_none());
}

#[tokio::test]
async fn test_terminal_status_callback_ends_session() {
    let (app, state, _generator) = echo_app(create_test_config());

    app.clone()
        .oneshot(form_request("/voice", "CallSid=CA109"))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(form_request(
            "/voice/status",
            "CallSid=CA109&CallStatus=in-progress",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!state.controller.session("CA109").await.unwrap().is_ended());

    let response = app
        .oneshot(form_request(
            "/voice/status",
            "CallSid=CA109&CallStatus=completed",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(state.controller.session("CA109").await.unwrap().is_ended());
}

#[tokio::test]
async fn test_status_callback_requires_call_sid() {
    let (app, _state, _generator) = echo_app(create_test_config());

    let response = app
        .oneshot(form_request("/voice/status", "CallStatus=completed"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_health_check() {
    let (app, _state, _generator) = echo_app(create_test_config());

    let response = app.oneshot(empty_request("GET", "/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"status": "OK"}));
}
