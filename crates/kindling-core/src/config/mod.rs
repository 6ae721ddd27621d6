//! Boot configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field has a default so an empty file is valid.

pub mod features;
pub mod logging;
pub mod plugin;
pub mod server;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use self::features::FeatureConfig;
use self::logging::LoggingConfig;
use self::plugin::PluginConfig;
use self::server::ServerConfig;

use crate::error::BootError;

/// Root boot configuration.
///
/// This is the configuration a host resolves during the
/// `register-early-extensions` stage and attaches to the boot context so
/// later stages can read it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootConfig {
    /// Transport settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Plugin installation settings.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Optional stage toggles.
    #[serde(default)]
    pub features: FeatureConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BootConfig {
    /// Top-level section names.
    pub const SECTIONS: [&str; 4] = ["server", "plugins", "features", "logging"];

    /// Whether `value` is an object carrying at least one configuration
    /// section. Anything else cannot stand for a configuration.
    pub fn has_known_section(value: &serde_json::Value) -> bool {
        value
            .as_object()
            .is_some_and(|map| Self::SECTIONS.iter().any(|section| map.contains_key(*section)))
    }

    /// Load configuration from `config/default`, `config/{env}` and
    /// environment variables prefixed with `KINDLING`.
    pub fn load(env: &str) -> Result<Self, BootError> {
        Self::load_from("config", env)
    }

    /// Same as [`BootConfig::load`] with an explicit configuration directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, BootError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("KINDLING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| BootError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| BootError::configuration(format!("Failed to deserialize config: {e}")))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, BootError> {
        let loaded: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects values the runtime cannot honor.
    pub fn validate(&self) -> Result<(), BootError> {
        if self.plugins.dependency_timeout_ms == 0 {
            return Err(BootError::configuration(
                "plugins.dependency_timeout_ms must be greater than zero",
            ));
        }
        if self.server.admin_port.is_some_and(|p| p == self.server.port && p != 0) {
            return Err(BootError::configuration(
                "server.admin_port must differ from server.port",
            ));
        }
        Ok(())
    }

    /// Dependency wait bound used by the plugin installer.
    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_millis(self.plugins.dependency_timeout_ms)
    }
}
