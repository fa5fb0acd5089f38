//! Telephony webhook routes
//!
//! These are called by the telephony provider and carry no bearer token.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{audio, voice};
use crate::state::AppState;
use std::sync::Arc;

/// Create the voice router
///
/// - `POST /voice` - one caller turn, answered with TwiML
/// - `POST /voice/status` - call status callback
/// - `GET /audio/{clip}` - synthesized reply audio referenced by `<Play>`
pub fn create_voice_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voice", post(voice::voice_webhook))
        .route("/voice/status", post(voice::voice_status))
        .route("/audio/{clip}", get(audio::get_clip))
        .layer(TraceLayer::new_for_http())
}
