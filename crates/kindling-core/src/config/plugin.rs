//! Plugin installation configuration.

use serde::{Deserialize, Serialize};

/// Plugin installation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// How long an install waits for its dependencies, in milliseconds.
    #[serde(default = "default_dependency_timeout")]
    pub dependency_timeout_ms: u64,
    /// Framework plugins installed by the `register-plugins` stage.
    #[serde(default = "default_framework")]
    pub framework: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            dependency_timeout_ms: default_dependency_timeout(),
            framework: default_framework(),
        }
    }
}

fn default_dependency_timeout() -> u64 {
    5000
}

fn default_framework() -> Vec<String> {
    vec!["system".to_string()]
}
