use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Every way an auth request can be rejected. The display strings double as
/// the client-facing messages, so none of them carry internal detail.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Username and password are required")]
    InvalidInput,
    #[error("Username already exists")]
    Conflict,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Access token required")]
    Unauthorized,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Internal server error")]
    StoreUnavailable,
    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    pub fn status(self) -> StatusCode {
        match self {
            AuthError::InvalidInput => StatusCode::BAD_REQUEST,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
            AuthError::StoreUnavailable | AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics.
    pub fn kind(self) -> &'static str {
        match self {
            AuthError::InvalidInput => "invalid_input",
            AuthError::Conflict => "conflict",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Unauthorized => "unauthorized",
            AuthError::InvalidToken => "invalid_token",
            AuthError::StoreUnavailable => "store_unavailable",
            AuthError::Internal => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::InvalidInput.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::StoreUnavailable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_share_a_generic_message() {
        assert_eq!(
            AuthError::StoreUnavailable.to_string(),
            AuthError::Internal.to_string()
        );
    }
}
