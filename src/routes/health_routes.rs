//! Health check endpoint.

use crate::state::AppState;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Returns a 200 OK status to indicate the service is running.
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
