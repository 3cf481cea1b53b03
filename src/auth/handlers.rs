use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        claims::Identity,
        dto::{CredentialsRequest, MessageResponse, TokenResponse},
        extractors::AuthUser,
    },
    errors::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(profile))
}

fn credentials(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<CredentialsRequest, AuthError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!(rejection = %rejection.body_text(), "unreadable credentials body");
            Err(AuthError::InvalidInput)
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let outcome = match credentials(payload) {
        Ok(body) => state.auth.register(&body.username, &body.password).await,
        Err(e) => Err(e),
    };
    state.metrics.record_outcome("register", &outcome);

    outcome?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let outcome = match credentials(payload) {
        Ok(body) => state.auth.login(&body.username, &body.password).await,
        Err(e) => Err(e),
    };
    state.metrics.record_outcome("login", &outcome);

    Ok(Json(TokenResponse { token: outcome? }))
}

#[instrument(skip(state))]
pub async fn profile(State(state): State<AppState>, AuthUser(user): AuthUser) -> Json<Identity> {
    state.metrics.record_auth("authenticate", "success");
    Json(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_response_serialization() {
        let response = Identity {
            id: 1,
            username: "alice".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 1, "username": "alice" }));
    }

    #[test]
    fn missing_credential_fields_default_to_empty() {
        let body: CredentialsRequest = serde_json::from_str(r#"{"username":"alice"}"#).unwrap();
        assert_eq!(body.username, "alice");
        assert!(body.password.is_empty());
    }
}
