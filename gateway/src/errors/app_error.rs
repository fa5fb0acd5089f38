//! Application-level error taxonomy
//!
//! Every failure a request can hit maps into [`AppError`]. JSON endpoints turn
//! it into a status code through [`IntoResponse`]; the telephony webhook never
//! does and instead renders an apology document (the provider cannot act on
//! HTTP error codes).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::core::gateway::GatewayError;
use crate::core::markup::MarkupError;
use crate::core::session::SessionError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed inbound request
    #[error("Validation error: {0}")]
    Validation(String),

    /// External gateway failed; callers recover with a fallback reply
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already ended: {0}")]
    SessionEnded(String),

    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => AppError::SessionNotFound(id),
            SessionError::Ended(id) => AppError::SessionEnded(id),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SessionEnded(_) => StatusCode::CONFLICT,
            AppError::Gateway(GatewayError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Gateway(GatewayError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Markup(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (
            status,
            Json(json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}
