//! Transport configuration.

use serde::{Deserialize, Serialize};

/// Listener configuration for the hosting runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// API port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Separate admin port. When unset, admin traffic shares the API listener.
    #[serde(default)]
    pub admin_port: Option<u16>,
    /// Public scheme advertised by documentation.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Public `host:port` advertised by documentation.
    #[serde(default = "default_public_host")]
    pub public_host: String,
    /// Free-form service description forwarded to documentation.
    #[serde(default)]
    pub info: Option<serde_json::Value>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_port: None,
            protocol: default_protocol(),
            public_host: default_public_host(),
            info: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_public_host() -> String {
    "localhost:5000".to_string()
}
