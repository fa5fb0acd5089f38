use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::Auth;
use crate::core::session::{Session, SessionStatus, Turn};
use crate::core::turn::TurnState;
use crate::errors::app_error::{AppError, AppResult};
use crate::handlers::voice::is_valid_session_id;
use crate::state::AppState;

/// Transcript view returned by `GET /conversation/{session_id}`
#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub session_id: String,
    pub status: SessionStatus,
    pub state: TurnState,
    pub turns: Vec<Turn>,
}

impl From<Session> for ConversationView {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id().to_string(),
            status: session.status(),
            state: TurnState::of(&session),
            turns: session.turns().to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UtteranceRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct UtteranceResponse {
    pub reply: String,
    #[serde(rename = "continue")]
    pub continue_call: bool,
    pub state: TurnState,
}

fn checked_id(session_id: &str) -> AppResult<&str> {
    if is_valid_session_id(session_id) {
        Ok(session_id)
    } else {
        Err(AppError::Validation(format!(
            "invalid session id: {session_id}"
        )))
    }
}

/// Ordered transcript plus status of a live session
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(session_id): Path<String>,
) -> AppResult<Json<ConversationView>> {
    let id = checked_id(&session_id)?;
    let session = state
        .controller
        .session(id)
        .await
        .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;

    debug!(
        session_id = id,
        auth_id = ?auth.id,
        turns = session.turns().len(),
        "Conversation fetched"
    );
    Ok(Json(session.into()))
}

/// Run one text turn through the controller, bypassing telephony
pub async fn post_utterance(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(session_id): Path<String>,
    body: Result<Json<UtteranceRequest>, JsonRejection>,
) -> AppResult<Json<UtteranceResponse>> {
    let id = checked_id(&session_id)?;
    let Json(request) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    debug!(
        session_id = id,
        auth_id = ?auth.id,
        authenticated = auth.is_authenticated(),
        "Text turn submitted"
    );

    let outcome = state.controller.handle_utterance(id, &request.text).await;

    Ok(Json(UtteranceResponse {
        reply: outcome.reply,
        continue_call: outcome.continue_call,
        state: outcome.state,
    }))
}

/// End a session explicitly. Repeating the call is harmless once the session exists.
pub async fn end_conversation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    let id = checked_id(&session_id)?;
    if state.controller.session(id).await.is_none() {
        return Err(AppError::SessionNotFound(id.to_string()));
    }

    state.controller.end_call(id).await;
    info!(session_id = id, auth_id = ?auth.id, "Conversation ended via API");
    Ok(StatusCode::NO_CONTENT)
}
