pub mod api;
pub mod voice;

use axum::{Router, middleware, routing::get};
use std::sync::Arc;

use crate::handlers::api::health_check;
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Combine public, voice and protected routes into one application router.
///
/// Transport layers (CORS, rate limiting, security headers) are added by the binary.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected_routes = api::create_api_router().layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    let public_routes = Router::new().route("/", get(health_check));

    public_routes
        .merge(voice::create_voice_router())
        .merge(protected_routes)
        .with_state(state)
}
