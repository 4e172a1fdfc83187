//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the numeric user id. The middleware verifies
//! them before any WebSocket upgrade and inserts an [`Auth`] into the request
//! extensions; handlers read the user from there.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::errors::auth_error::{AuthError, AuthResult};
use crate::store::UserId;

/// User id given to every request when authentication is disabled
pub const ANONYMOUS_USER: UserId = 0;

/// Authenticated caller, inserted into request extensions by the auth middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Auth {
    pub user_id: UserId,
    pub anonymous: bool,
}

impl Auth {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            anonymous: false,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS_USER,
            anonymous: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    /// Expiry as seconds since the epoch
    pub exp: i64,
}

/// Verifies HS256 tokens against the configured secret
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> AuthResult<Self> {
        if secret.trim().is_empty() {
            return Err(AuthError::ConfigError("JWT secret is empty".to_string()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.required_spec_claims.insert("exp".to_string());
        validation.leeway = 0;

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn verify(&self, token: &str) -> AuthResult<Auth> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;
        Ok(Auth::user(data.claims.user_id))
    }
}

/// Sign a token for `user_id` valid for `ttl_seconds`
pub fn issue_token(secret: &str, user_id: UserId, ttl_seconds: i64) -> AuthResult<String> {
    let claims = Claims {
        user_id,
        exp: Utc::now().timestamp() + ttl_seconds,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::ConfigError(format!("Failed to sign token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_round_trip() {
        let token = issue_token("secret", 42, 3600).unwrap();
        let verifier = JwtVerifier::new("secret").unwrap();
        assert_eq!(verifier.verify(&token).unwrap(), Auth::user(42));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("secret", 42, 3600).unwrap();
        let verifier = JwtVerifier::new("other").unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token("secret", 42, -60).unwrap();
        let verifier = JwtVerifier::new("secret").unwrap();
        assert!(matches!(verifier.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let verifier = JwtVerifier::new("secret").unwrap();
        assert!(verifier.verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_empty_secret_is_config_error() {
        assert!(matches!(
            JwtVerifier::new(" "),
            Err(AuthError::ConfigError(_))
        ));
    }
}
