//! Shared application state.

use crate::config::GateConfig;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned into each handler; carries the configuration snapshot taken at
/// startup, which includes the server-side password secrets.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
}
