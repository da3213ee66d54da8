//! Client side of the config endpoint.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ConfigStatus;

/// Which password class a validation request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The whole application.
    Access,
    /// The settings panel only.
    Settings,
}

/// Remote side of the gate: query configuration status and validate a
/// submitted password. Both calls are single attempts without retry.
#[async_trait]
pub trait ConfigApi: Send + Sync {
    async fn fetch_status(&self) -> Result<ConfigStatus, String>;
    async fn validate(&self, password: &str, scope: Scope) -> Result<bool, String>;
}

/// reqwest-backed client for the config endpoint.
pub struct HttpConfigClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpConfigClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpConfigClient {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/config", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ConfigApi for HttpConfigClient {
    async fn fetch_status(&self) -> Result<ConfigStatus, String> {
        let url = self.endpoint();
        debug!("Fetching config status from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Error sending request: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Unexpected status code: {}", response.status()));
        }

        response
            .json::<ConfigStatus>()
            .await
            .map_err(|e| format!("Error parsing JSON: {}", e))
    }

    async fn validate(&self, password: &str, scope: Scope) -> Result<bool, String> {
        let body = match scope {
            Scope::Settings => json!({ "password": password, "type": "settings" }),
            Scope::Access => json!({ "password": password }),
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Error sending request: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Unexpected status code: {}", response.status()));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| format!("Error parsing JSON: {}", e))?;
        Ok(result["valid"].as_bool().unwrap_or(false))
    }
}
