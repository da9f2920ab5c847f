use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, Cookie, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::debug;

use reward_types::UserId;
use reward_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the cookie `/auth/login` sets, accepted in place of a bearer token.
pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    Missing,

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Turns a presented credential into the identity performing the request.
pub trait AuthVerifier: Send + Sync {
    fn resolve_identity(&self, credential: &str) -> Result<Claims, AuthError>;
}

/// HS256 JWTs signed with a shared secret.
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl JwtAuth {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: UserId, username: &str) -> anyhow::Result<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(token)
    }
}

impl AuthVerifier for JwtAuth {
    fn resolve_identity(&self, credential: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(credential, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

/// Extract and validate the JWT from the Authorization header, falling back to
/// the `token` cookie.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = credential(&req)
        .ok_or(AuthError::Missing)
        .and_then(|token| state.auth.resolve_identity(&token))
        .map_err(|e| {
            debug!("Rejected request to {}: {}", req.uri().path(), e);
            ApiError::Unauthorized
        })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn credential(req: &Request) -> Option<String> {
    let headers = req.headers();
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    headers
        .typed_get::<Cookie>()
        .and_then(|cookies| cookies.get(TOKEN_COOKIE).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let auth = JwtAuth::new("test-secret", chrono::Duration::minutes(5));
        let token = auth.issue(UserId(42), "alice").unwrap();

        let claims = auth.resolve_identity(&token).unwrap();
        assert_eq!(claims.sub, UserId(42));
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn foreign_and_expired_tokens_fail() {
        let auth = JwtAuth::new("test-secret", chrono::Duration::minutes(5));
        let other = JwtAuth::new("other-secret", chrono::Duration::minutes(5));
        let token = other.issue(UserId(1), "mallory").unwrap();
        assert!(matches!(auth.resolve_identity(&token), Err(AuthError::Invalid(_))));

        let expired = JwtAuth::new("test-secret", chrono::Duration::minutes(-10));
        let token = expired.issue(UserId(1), "alice").unwrap();
        assert!(auth.resolve_identity(&token).is_err());

        assert!(auth.resolve_identity("not-a-jwt").is_err());
    }
}
