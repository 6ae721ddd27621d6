//! The hosting runtime the orchestrator drives.
//!
//! Every stage default delegates to a [`HostRuntime`] method. All methods
//! have defaults, so a host only implements what it actually provides.

pub mod catalog;
pub mod tcp;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use kindling_core::config::BootConfig;
use kindling_core::result::BootResult;
use kindling_plugin::{DirectActivator, Injector, PluginActivator, Registration};

use crate::context::{BootContext, ConnectionSpec};

pub use catalog::PluginCatalog;
pub use tcp::TcpHost;

/// Collaborator that owns the actual server the plugins are installed into.
#[async_trait]
pub trait HostRuntime: Send + Sync + std::fmt::Debug {
    /// Default of `configure-runtime`. Receives `{options}` and returns the
    /// runtime options, which later stages read through
    /// [`BootContext::runtime_options`].
    async fn configure_runtime(&self, params: Value) -> BootResult<Value> {
        Ok(params)
    }

    /// Default of `register-early-extensions`: resolves the boot configuration.
    ///
    /// Reads a `config` object from the launch options when present, else
    /// uses defaults.
    async fn resolve_config(&self, ctx: &BootContext) -> BootResult<BootConfig> {
        let config = match ctx.options().get("config") {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
            _ => BootConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Default of the `inject-dependencies` hook.
    async fn inject_dependencies(&self, _injector: &Injector) -> BootResult<()> {
        Ok(())
    }

    /// Opens one planned connection.
    async fn open_connection(&self, _ctx: &BootContext, spec: &ConnectionSpec) -> BootResult<()> {
        debug!(port = spec.port, labels = ?spec.labels, "Connection registered");
        Ok(())
    }

    /// Default of `configure-security`, only called when security is enabled.
    async fn configure_security(&self, _ctx: &BootContext) -> BootResult<Value> {
        Ok(Value::Null)
    }

    /// Default of `configure-documentation`, only called when documentation
    /// is enabled. Receives the `{schemes, host, info}` description.
    async fn configure_documentation(&self, documentation: Value) -> BootResult<Value> {
        Ok(documentation)
    }

    /// Framework plugins installed by the `register-plugins` default.
    async fn framework_plugins(&self, _config: &BootConfig) -> BootResult<Vec<Registration>> {
        Ok(Vec::new())
    }

    /// Default of `register-late-extensions`.
    async fn register_late_extensions(&self, _ctx: &BootContext) -> BootResult<()> {
        Ok(())
    }

    /// Default of `before-start`.
    async fn before_start(&self, _ctx: &BootContext) -> BootResult<()> {
        Ok(())
    }

    /// Default of `start`. Returns the runtime info.
    async fn start(&self, ctx: &BootContext) -> BootResult<Value> {
        Ok(json!({ "connections": ctx.connections() }))
    }

    /// Default of `started`.
    async fn on_started(&self, _info: &Value) -> BootResult<()> {
        Ok(())
    }

    /// Activates one plugin once its dependencies are fulfilled.
    async fn activate(&self, registration: &Registration) -> BootResult<Value> {
        DirectActivator.activate(registration).await
    }
}

/// Exposes a host as the installer's [`PluginActivator`].
#[derive(Debug)]
pub struct HostActivator {
    host: Arc<dyn HostRuntime>,
}

impl HostActivator {
    /// Wraps `host`.
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl PluginActivator for HostActivator {
    async fn activate(&self, registration: &Registration) -> BootResult<Value> {
        self.host.activate(registration).await
    }
}
