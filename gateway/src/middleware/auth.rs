use crate::auth::{Auth, match_api_secret_id};
use crate::errors::auth_error::AuthError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extract authentication token from request
///
/// Token sources, in priority order:
/// 1. Authorization header: `Authorization: Bearer <token>` (preferred)
/// 2. Query parameter: `?token=<token>`
fn extract_token(request: &Request) -> Result<String, AuthError> {
    if let Some(auth_header) = request.headers().get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            tracing::debug!("Token extracted from Authorization header");
            return Ok(token.trim().to_string());
        }
        return Err(AuthError::InvalidAuthHeader);
    }

    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" {
                tracing::debug!("Token extracted from query parameter");
                return Ok(value.to_string());
            }
        }
    }

    Err(AuthError::MissingAuthHeader)
}

/// Authentication middleware for the conversation API
///
/// When `auth_required` is off, an empty [`Auth`] is inserted and the request
/// passes through. Otherwise the bearer token must match one of the configured
/// API secrets (constant-time comparison); the matched secret id is attached
/// to the request as [`Auth`].
///
/// # Returns
/// * `Result<Response, AuthError>` - The response from the next handler or a 401
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !state.config.auth_required {
        tracing::debug!("Authentication disabled, inserting empty Auth context");
        request.extensions_mut().insert(Auth::empty());
        return Ok(next.run(request).await);
    }

    let request_method = request.method().to_string();
    let request_path = request.uri().path().to_string();

    if !state.config.has_api_secret_auth() {
        // Rejected by config validation; reachable only with a hand-built config
        return Err(AuthError::ConfigError(
            "auth required but no API secrets configured".to_string(),
        ));
    }

    let token = extract_token(&request)?;

    match match_api_secret_id(&token, &state.config.auth_api_secrets) {
        Some(secret_id) => {
            tracing::info!(
                method = %request_method,
                path = %request_path,
                auth_id = %secret_id,
                "API secret authentication successful"
            );
            request.extensions_mut().insert(Auth::new(secret_id));
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(
                method = %request_method,
                path = %request_path,
                "API secret authentication failed: token mismatch"
            );
            Err(AuthError::Unauthorized("Invalid API secret".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_token_from_header() {
        let token = extract_token(&request("/conversation/CA1", Some("Bearer abc"))).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn test_extract_token_from_query() {
        let token = extract_token(&request("/conversation/CA1?token=q%20t", None)).unwrap();
        assert_eq!(token, "q t");
    }

    #[test]
    fn test_extract_token_rejects_other_schemes() {
        let err = extract_token(&request("/conversation/CA1", Some("Basic abc"))).unwrap_err();
        assert!(matches!(err, AuthError::InvalidAuthHeader));
    }

    #[test]
    fn test_extract_token_missing() {
        let err = extract_token(&request("/conversation/CA1", None)).unwrap_err();
        assert!(matches!(err, AuthError::MissingAuthHeader));
    }
}
