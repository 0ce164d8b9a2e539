use std::net::SocketAddr;

use axum::Router;
use common::env::{ensure_sqlite_dir, warn_if_default};
use configs::AppConfig;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes;
use crate::state::ServerState;
use service::Services;

fn build_cors() -> CorsLayer {
    CorsLayer::new()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address: {}", e)))
}

/// Connect the database, wire the services and build the router.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    warn_if_default("auth.session_secret", &cfg.auth.session_secret, configs::DEV_SESSION_SECRET);
    warn_if_default("auth.common_password", &cfg.auth.common_password, configs::DEV_COMMON_PASSWORD);

    ensure_sqlite_dir(&cfg.database.url).await?;
    let db = models::db::connect_and_migrate(&models::db::DatabaseConfig::from(&cfg.database)).await?;
    let services = Services::from_config(cfg, db)?;
    let state = ServerState::new(&services, cfg)?;
    Ok(routes::build_router(state, build_cors()))
}

/// Public entry: build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    let app = build_app(&cfg).await?;
    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting slhweb server");
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(anyhow::Error::from)?;
    axum::serve(listener, app).await.map_err(anyhow::Error::from)?;
    Ok(())
}
