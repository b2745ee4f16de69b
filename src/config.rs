//! Layered configuration
//!
//! Built-in defaults, then an optional TOML file, then `ASKGUIDE_*`
//! environment variables. Command-line flags are applied by the binaries
//! on top of the extracted value.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "ASKGUIDE_";

/// SQLite file holding the onboarding flag, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "askguide.db";

/// Bearer token for the inference endpoint. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Daemon and client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen address for the daemon
    pub bind_addr: SocketAddr,
    /// SQLite file for the flag store (None = in-memory, for tests)
    pub db_path: Option<String>,
    /// Inference API base URL
    pub endpoint_url: String,
    /// Model path appended to `{endpoint_url}/models/`
    pub model: String,
    /// Bearer token; generation is disabled without one
    pub api_token: Option<ApiToken>,
    /// Deadline for a single generation request
    pub request_timeout_secs: u64,
    /// Ask the hosted API to block until a cold model is loaded
    pub wait_for_model: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: Some(DEFAULT_DB_PATH.to_string()),
            endpoint_url: "https://api-inference.huggingface.co".to_string(),
            model: "runwayml/stable-diffusion-v1-5".to_string(),
            api_token: None,
            request_timeout_secs: 120,
            wait_for_model: false,
        }
    }
}

impl Config {
    /// Load defaults, an optional TOML file, and `ASKGUIDE_*` env vars
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX)).extract()
    }

    /// Full URL of the model's inference endpoint
    pub fn model_url(&self) -> String {
        format!(
            "{}/models/{}",
            self.endpoint_url.trim_end_matches('/'),
            self.model.trim_start_matches('/')
        )
    }

    /// Request deadline as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
