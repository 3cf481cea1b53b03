use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::claims::Identity;
use crate::{errors::AuthError, state::AppState};

/// Extracts and validates the bearer token, yielding the caller's identity.
///
/// No token at all is `401`; a token that fails verification is `403`.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token);

        let identity = state.auth.authenticate(token).map_err(|e| {
            warn!(reason = e.kind(), "profile access rejected");
            state.metrics.record_auth("authenticate", e.kind());
            e
        })?;

        Ok(AuthUser(identity))
    }
}

/// Expect "Bearer <token>"; the scheme is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
