use axum::{
    middleware,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;

use common::types::Health;

use crate::state::ServerState;

pub mod account;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: public pages, the OAuth flow and login-protected settings
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    // Login required
    let protected = Router::new()
        .route(account::SETTINGS_PATH, get(account::settings_page).post(account::settings_submit))
        .route_layer(middleware::from_fn_with_state(state.clone(), account::require_login));

    let public = Router::new()
        .route("/", get(account::index))
        .route(account::INDEX_PATH, get(account::index))
        .route(account::LOGIN_PATH, get(account::login))
        .route("/account/oauth2callback", get(account::oauth2callback))
        .route("/account/logout", get(account::logout))
        .route("/health", get(health));

    public
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                // status code and latency
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
