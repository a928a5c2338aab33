//! API route modules.

pub mod health;
pub mod resolve;

use axum::{routing::get, Router};

use crate::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/resolve-streamtape", get(resolve::resolve_streamtape))
        .route("/resolve", get(resolve::resolve_streamtape))
        .route("/health", get(health::health_check))
        .with_state(state)
}
