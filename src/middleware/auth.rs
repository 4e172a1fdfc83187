use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::Auth;
use crate::errors::auth_error::AuthError;
use crate::state::AppState;

/// Extract authentication token from request
///
/// Supports multiple token sources for browser/WebSocket compatibility:
/// 1. Authorization header: `Authorization: Bearer <token>` (preferred)
/// 2. Query parameter: `?token=<token>` (for WebSocket connections)
fn extract_token(request: &Request) -> Result<String, AuthError> {
    // Try Authorization header first (preferred method)
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

    // Browsers cannot set headers on a WebSocket handshake
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

/// Authentication middleware that validates bearer tokens
///
/// The middleware:
/// 1. Inserts an anonymous [`Auth`] and passes through when auth is disabled
/// 2. Extracts the token from the Authorization header or `?token=` query
/// 3. Verifies it as an HS256 JWT and inserts the caller's [`Auth`]
/// 4. Returns 401 if verification fails
///
/// Runs before the WebSocket upgrade, so unauthenticated clients never get a
/// session.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !state.config.auth_required {
        tracing::debug!("Authentication disabled, inserting anonymous Auth context");
        request.extensions_mut().insert(Auth::anonymous());
        return Ok(next.run(request).await);
    }

    let request_method = request.method().to_string();
    let request_path = request.uri().path().to_string();

    let verifier = state
        .jwt
        .as_ref()
        .ok_or_else(|| AuthError::ConfigError("JWT verifier not initialized".to_string()))?;

    let token = extract_token(&request)?;

    match verifier.verify(&token) {
        Ok(auth) => {
            tracing::debug!(
                method = %request_method,
                path = %request_path,
                user_id = auth.user_id,
                "JWT authentication successful"
            );
            request.extensions_mut().insert(auth);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(
                method = %request_method,
                path = %request_path,
                error = %e,
                "JWT authentication failed"
            );
            Err(e)
        }
    }
}
