use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors raised by the bearer-token middleware guarding the conversation API
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Auth configuration error: {0}")]
    ConfigError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Configuration details stay in the logs
        let message = match &self {
            AuthError::ConfigError(detail) => {
                tracing::error!(error = %detail, "Authentication misconfigured");
                "Authentication unavailable".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "error": message,
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            AuthError::MissingAuthHeader.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Unauthorized("nope".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::ConfigError("broken".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
