//! HTTP route definitions and handlers.
//!
//! This module organizes the endpoints into logical groups:
//! config status/validation and health checks.

mod config_routes;
mod health_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
///
/// Combines all route modules into a single router and attaches
/// the application state for access in handlers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(config_routes::routes())
        .merge(health_routes::routes())
        .with_state(state)
}
