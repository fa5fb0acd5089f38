//! Telephony webhooks.
//!
//! `POST /voice` always answers with HTTP 200 and a TwiML document: malformed
//! requests and gateway failures are turned into spoken apologies, never into
//! error statuses the telephony provider would read out as an application error.

use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::gateway::{GatewayError, with_timeout};
use crate::core::markup::{self, VoiceResponse};
use crate::core::turn::TurnOutcome;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Call-id headers consulted when the form carries no `CallSid`
const CALL_SID_HEADERS: [&str; 2] = ["x-twilio-callsid", "x-call-sid"];

/// Call statuses after which no more turns arrive
const TERMINAL_CALL_STATUSES: [&str; 5] = ["completed", "busy", "failed", "no-answer", "canceled"];

/// Form fields posted by Twilio (unknown fields are ignored)
#[derive(Debug, Default, Deserialize)]
pub struct VoiceWebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    /// Plain-text utterance, for clients that already transcribed the caller
    pub caller_text: Option<String>,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
    #[serde(rename = "RecordingUrl")]
    pub recording_url: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

/// Session ids come from call SIDs: 1-128 ASCII letters, digits, `-` or `_`
pub(crate) fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn resolve_session_id(form: &VoiceWebhookForm, headers: &HeaderMap) -> Option<String> {
    let from_form = form
        .call_sid
        .as_deref()
        .map(str::trim)
        .filter(|sid| !sid.is_empty());

    let from_headers = || {
        CALL_SID_HEADERS.iter().find_map(|name| {
            headers
                .get(*name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|sid| !sid.is_empty())
        })
    };

    from_form
        .or_else(from_headers)
        .map(str::to_string)
        .filter(|sid| is_valid_session_id(sid))
}

fn twiml(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, markup::CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// Resolve the caller's utterance: `caller_text`, then `SpeechResult`, then a transcribed `RecordingUrl`.
///
/// `Ok(None)` means the request carried no utterance at all.
async fn resolve_utterance(
    state: &AppState,
    session_id: &str,
    form: &VoiceWebhookForm,
) -> Result<Option<String>, GatewayError> {
    if let Some(text) = &form.caller_text {
        return Ok(Some(text.clone()));
    }
    if let Some(text) = &form.speech_result {
        return Ok(Some(text.clone()));
    }

    let Some(url) = form.recording_url.as_deref().filter(|u| !u.trim().is_empty()) else {
        return Ok(None);
    };

    let transcriber = state.transcriber.as_ref().ok_or_else(|| {
        GatewayError::Unavailable("no transcription gateway configured".to_string())
    })?;

    let bound = state.config.gateways.transcription_timeout();
    let text = with_timeout(bound, async {
        let audio = state.recordings.fetch(url.trim()).await?;
        transcriber
            .transcribe(audio, state.config.gateways.speech_language.as_deref())
            .await
    })
    .await?;

    debug!(session_id, chars = text.len(), "Recording transcribed");
    Ok(Some(text))
}

async fn render_outcome(state: &AppState, outcome: &TurnOutcome, action: &str) -> Response {
    let spoken = state.voicer.voice(&outcome.reply).await;
    let document = VoiceResponse::new()
        .with_language(state.config.gateways.speech_language.clone())
        .for_turn(spoken, outcome.continue_call, action)
        .render();

    match document {
        Ok(body) => twiml(body),
        Err(e) => {
            let err = AppError::from(e);
            warn!(error = %err, "Falling back to static apology");
            twiml(markup::apology(
                &state.controller.replies().fallback,
                action,
            ))
        }
    }
}

/// Voice webhook: one caller turn in, one TwiML document out
pub async fn voice_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<VoiceWebhookForm>, FormRejection>,
) -> Response {
    let action = state.voice_action();
    let apology = || twiml(markup::apology(&state.controller.replies().fallback, &action));

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "Malformed voice webhook");
            return apology();
        }
    };

    let Some(session_id) = resolve_session_id(&form, &headers) else {
        warn!("Voice webhook without a usable CallSid");
        return apology();
    };

    let utterance = match resolve_utterance(&state, &session_id, &form).await {
        Ok(utterance) => utterance,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Could not obtain caller utterance");
            return apology();
        }
    };

    info!(
        session_id = %session_id,
        has_utterance = utterance.is_some(),
        "Voice webhook received"
    );

    let outcome = state
        .controller
        .handle_contact(&session_id, utterance.as_deref())
        .await;

    render_outcome(&state, &outcome, &action).await
}

/// Call status callback: ends the session when the call reaches a terminal status
pub async fn voice_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<VoiceWebhookForm>, FormRejection>,
) -> AppResult<StatusCode> {
    let Form(form) = form.map_err(|e| AppError::Validation(e.to_string()))?;

    let session_id = resolve_session_id(&form, &headers)
        .ok_or_else(|| AppError::Validation("missing or invalid CallSid".to_string()))?;

    let status = form
        .call_status
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if TERMINAL_CALL_STATUSES.contains(&status.as_str()) {
        state.controller.end_call(&session_id).await;
        info!(session_id = %session_id, call_status = %status, "Call reached terminal status");
    } else {
        debug!(session_id = %session_id, call_status = %status, "Ignoring non-terminal call status");
    }

    Ok(StatusCode::NO_CONTENT)
}
