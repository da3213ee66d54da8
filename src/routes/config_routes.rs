//! Config status and password validation endpoints.
//!
//! `GET /api/config` exposes configuration status (never actual values) to
//! the client. `POST /api/config` validates a submitted password for the
//! "access" or "settings" scope against the server-side secrets.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ConfigStatus;
use crate::state::AppState;

/// Registers the config routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/config", get(config_status).post(validate_password))
}

/// Body of a `POST /api/config` validation request. `type` selects the
/// password scope; anything other than "settings" means "access". A missing
/// `password` field is not a malformed request: it reads as empty and simply
/// fails the comparison.
#[derive(Deserialize, Debug)]
struct ValidateRequest {
    #[serde(default)]
    password: String,
    #[serde(rename = "type")]
    scope: Option<String>,
}

/// Result of a validation attempt. An unconfigured scope is reported as a
/// non-error invalid result with an explanatory message, not an HTTP error.
#[derive(Serialize, Debug, PartialEq, Eq)]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ValidateResponse {
    fn invalid(message: &str) -> Self {
        ValidateResponse {
            valid: false,
            message: Some(message.to_string()),
        }
    }

    fn from_check(valid: bool) -> Self {
        ValidateResponse {
            valid,
            message: None,
        }
    }
}

/// Reports which passwords are configured server-side.
///
/// Only presence booleans and the opaque subscription-source string cross
/// the wire; the secrets themselves stay on the server. Always 200.
async fn config_status(State(state): State<AppState>) -> Json<ConfigStatus> {
    Json(state.config.status())
}

/// Validates a submitted password for one of the two scopes.
///
/// The body is parsed by hand so a malformed request gets the documented
/// 400 `{valid:false, message:"Invalid request"}` shape instead of the
/// extractor's default rejection. The submitted password is never logged.
async fn validate_password(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request: ValidateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejecting malformed validation request: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ValidateResponse::invalid("Invalid request")),
            );
        }
    };

    let scope = request.scope.as_deref().unwrap_or("access");
    debug!("Validating password for scope '{}'", scope);

    let response = if scope == "settings" {
        if state.config.settings_password.is_empty() {
            ValidateResponse::invalid("No env settings password set")
        } else {
            ValidateResponse::from_check(request.password == state.config.settings_password)
        }
    } else if state.config.access_password.is_empty() {
        ValidateResponse::invalid("No env password set")
    } else {
        ValidateResponse::from_check(request.password == state.config.access_password)
    };

    (StatusCode::OK, Json(response))
}
