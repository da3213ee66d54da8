//! Application startup and server initialization.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::GateConfig;
use crate::routes;
use crate::state::AppState;

/// Initializes and runs the application server.
///
/// Binds to the address specified in the configuration and serves the
/// config and health routes until shutdown.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the specified address
/// or encounters a runtime error during execution.
pub async fn run(config: Arc<GateConfig>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting server on {}", config.bind_address);

    let state = AppState {
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
