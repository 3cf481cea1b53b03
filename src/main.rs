mod app;
mod auth;
mod config;
mod db;
mod errors;
mod metrics;
mod routes;
mod state;

use anyhow::Context;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "weatherdash=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env().context("load configuration")?;
    let (host, port) = (config.host.clone(), config.port);

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;
    tracing::info!("connected to database");

    let app_state = AppState::init(pool.clone(), config)?;
    let app = app::build_app(app_state);

    app::serve(app, &host, port).await?;

    pool.close().await;
    tracing::info!("database pool closed");
    Ok(())
}
