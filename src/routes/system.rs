use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::error;
use url::Url;

use crate::{config::AppConfig, state::AppState};

pub fn system_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/env", get(env_info))
        .route("/metrics", get(metrics))
}

pub async fn root() -> &'static str {
    "Weather dashboard API is running"
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(HealthResponse {
        status: "healthy",
        timestamp,
    })
}

/// Deployment details that are safe to expose. Credentials and the signing
/// secret are never part of this.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct EnvInfo {
    pub app_env: String,
    pub database_host: Option<String>,
    pub database_user: Option<String>,
    pub database_name: Option<String>,
    pub port: u16,
}

impl EnvInfo {
    pub fn from_config(config: &AppConfig) -> Self {
        let db = Url::parse(&config.database_url).ok();
        Self {
            app_env: config.app_env.clone(),
            database_host: db.as_ref().and_then(|u| u.host_str()).map(str::to_string),
            database_user: db
                .as_ref()
                .map(|u| u.username().to_string())
                .filter(|u| !u.is_empty()),
            database_name: db
                .as_ref()
                .map(|u| u.path().trim_start_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            port: config.port,
        }
    }
}

pub async fn env_info(State(state): State<AppState>) -> Json<EnvInfo> {
    Json(EnvInfo::from_config(&state.config))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_info_omits_credentials() {
        let (state, _) = AppState::fake();
        let info = EnvInfo::from_config(&state.config);
        assert_eq!(
            info,
            EnvInfo {
                app_env: "test".into(),
                database_host: Some("db.internal".into()),
                database_user: Some("weather".into()),
                database_name: Some("lab_db".into()),
                port: 3000,
            }
        );

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains(&state.config.jwt.secret));
    }

    #[tokio::test]
    async fn health_timestamp_is_rfc3339() {
        let Json(body) = health().await;
        assert_eq!(body.status, "healthy");
        assert!(OffsetDateTime::parse(&body.timestamp, &Rfc3339).is_ok());
    }
}
