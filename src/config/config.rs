use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Deserializer, Serialize};

use super::logging::LoggingConfig;

/// Process-wide configuration, captured once at startup.
///
/// Secrets come from the environment: `ACCESS_PASSWORD` guards the whole
/// application, `SETTINGS_PASSWORD` guards the settings panel. An empty
/// string disables the corresponding password. Handlers receive this as an
/// injected snapshot; nothing reads the environment after startup.
#[derive(Deserialize, JsonSchema, Clone)]
pub struct GateConfig {
    #[serde(default)]
    pub access_password: String,
    #[serde(default)]
    pub settings_password: String,
    /// True unless set to the literal "false".
    #[serde(default = "default_true", deserialize_with = "true_unless_false")]
    pub persist_password: bool,
    /// Opaque passthrough for the client; the server never interprets it.
    #[serde(default)]
    pub subscription_sources: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GateConfig {
    /// The client-visible view of this configuration. Password values are
    /// reduced to presence booleans; they never cross the wire.
    pub fn status(&self) -> ConfigStatus {
        ConfigStatus {
            has_env_password: !self.access_password.is_empty(),
            has_env_settings_password: !self.settings_password.is_empty(),
            persist_password: self.persist_password,
            subscription_sources: self.subscription_sources.clone(),
        }
    }
}

/// Keep secrets out of debug logs.
impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("access_password", &"[REDACTED]")
            .field("settings_password", &"[REDACTED]")
            .field("persist_password", &self.persist_password)
            .field("subscription_sources", &self.subscription_sources)
            .field("bind_address", &self.bind_address)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Configuration status as reported by `GET /api/config`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub has_env_password: bool,
    pub has_env_settings_password: bool,
    pub persist_password: bool,
    pub subscription_sources: String,
}

/// The figment stack: an optional "config.yaml" in the current directory,
/// overridden by environment variables (`LOGGING__LEVEL` style nesting).
pub fn figment() -> Figment {
    Figment::new()
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::prefixed("").split("__"))
}

/// Load config from the figment stack, exiting on error.
pub fn load_config() -> GateConfig {
    match figment().extract::<GateConfig>() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(GateConfig);
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

/// `PERSIST_PASSWORD` semantics: anything but the literal "false" keeps the
/// default of true. Accepts a plain bool as well since figment parses
/// "true"/"false" env values into booleans before serde sees them.
fn true_unless_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl serde::de::Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a boolean or string flag")
        }

        fn visit_bool<E>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_str<E>(self, v: &str) -> Result<bool, E> {
            Ok(v != "false")
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}
