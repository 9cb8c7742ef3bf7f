//! HTTP surface.

mod error;
pub mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    // `/api/info` and `/api/status` are matched before the `:operation`
    // capture because static segments take priority.
    let api = Router::new()
        .route("/api/info", post(handlers::info))
        .route("/api/status", get(handlers::status))
        .route("/api/download/:id", get(handlers::download))
        .route("/api/:operation", post(handlers::run_operation))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
