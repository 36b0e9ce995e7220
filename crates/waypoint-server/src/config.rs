//! Server-level configuration.

use std::net::SocketAddr;

use serde::Deserialize;
use waypoint_auth::config::{BridgeConfig, ConfigError};

/// Top level of `waypoint.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Bridge configuration: token signing, admission, providers.
    pub bridge: BridgeConfig,
}

fn default_listen() -> SocketAddr {
    ([0, 0, 0, 0], 8080).into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, overridable per run with `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Checks the whole file.
    ///
    /// # Errors
    ///
    /// Returns the first invalid or missing value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bridge.validate()
    }
}
