use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::conversation;
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Authentication is layered on by [`super::create_router`] once state is available.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/conversation/{session_id}",
            get(conversation::get_conversation)
                .post(conversation::post_utterance)
                .delete(conversation::end_conversation),
        )
        .layer(TraceLayer::new_for_http())
}
