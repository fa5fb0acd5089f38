use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::core::audio::is_valid_clip_id;
use crate::state::AppState;

const CONTENT_TYPE: &str = "audio/mpeg";

/// Serve a synthesized reply clip referenced by a `<Play>` verb
///
/// Accepts the bare clip id or `{id}.mp3`. Clips expire with the audio cache.
pub async fn get_clip(State(state): State<Arc<AppState>>, Path(clip): Path<String>) -> Response {
    let id = clip.strip_suffix(".mp3").unwrap_or(&clip);

    if !is_valid_clip_id(id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid clip id", "status": 400})),
        )
            .into_response();
    }

    match state.voicer.cache().get(id).await {
        Some(audio) => {
            debug!(clip_id = id, bytes = audio.len(), "Serving clip");
            let mut response = audio.into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, max-age=300"),
            );
            response
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Clip not found: {id}"), "status": 404})),
        )
            .into_response(),
    }
}
