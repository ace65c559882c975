use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// LoggingConfig controls how we initialize tracing/logging.
///
/// The token exchange logs upstream bodies at `debug` and failure summaries at
/// `error`, so `level` alone decides how chatty a login attempt is.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LoggingConfig {
    pub level: String,  // e.g. "info", "debug", "warn"
    pub format: String, // e.g. "json", "console"
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
}

fn default_service_name() -> String {
    "wishtree".to_string()
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
