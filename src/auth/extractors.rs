use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::jwt::{Claims, TokenIssuer},
    errors::{ApiError, AuthError},
};

/// Validated access token claims of the caller.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<dyn TokenIssuer>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<dyn TokenIssuer>::from_ref(state);

        // Expect "Bearer <token>"
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .ok_or(AuthError::MissingToken)?;

        let claims = tokens.verify_access(token.trim()).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AuthError::InvalidToken
        })?;

        Ok(AuthUser(claims))
    }
}
