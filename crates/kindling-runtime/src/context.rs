//! Per-launch boot context.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use kindling_core::config::BootConfig;
use kindling_core::config::server::ServerConfig;
use kindling_core::error::BootError;
use kindling_core::result::BootResult;
use kindling_plugin::{DependencyRegistry, HookRegistry, Injector, PluginInstaller};

/// Label of the public API connection.
pub const API_LABEL: &str = "api";
/// Label of the administration connection.
pub const ADMIN_LABEL: &str = "admin";

/// A listening connection the host should open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// Port to listen on. `0` lets the OS pick one.
    pub port: u16,
    /// Labels routed to this connection.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl ConnectionSpec {
    /// Creates a connection spec.
    pub fn new<I, S>(port: u16, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            port,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the connection carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Plans the connections for `server`: an `api` connection, plus a
    /// separate `admin` one when an admin port is set. Without an admin
    /// port the api connection carries both labels.
    pub fn plan(server: &ServerConfig) -> Vec<Self> {
        match server.admin_port {
            Some(admin_port) => vec![
                Self::new(server.port, [API_LABEL]),
                Self::new(admin_port, [ADMIN_LABEL]),
            ],
            None => vec![Self::new(server.port, [API_LABEL, ADMIN_LABEL])],
        }
    }
}

/// State shared by every stage of one launch.
///
/// Created once per `launch`. The registries are owned by the orchestrator
/// and only borrowed here.
#[derive(Debug)]
pub struct BootContext {
    boot_id: Uuid,
    options: Value,
    dependencies: Arc<DependencyRegistry>,
    hooks: Arc<HookRegistry>,
    injector: Arc<Injector>,
    installer: Arc<PluginInstaller>,
    runtime_options: RwLock<Value>,
    config: RwLock<Option<Arc<BootConfig>>>,
    connections: RwLock<Vec<ConnectionSpec>>,
    info: RwLock<Value>,
}

impl BootContext {
    /// Creates a context for a launch with `options`.
    pub fn new(
        options: Value,
        dependencies: Arc<DependencyRegistry>,
        hooks: Arc<HookRegistry>,
        injector: Arc<Injector>,
        installer: Arc<PluginInstaller>,
    ) -> Self {
        Self {
            boot_id: Uuid::new_v4(),
            options,
            dependencies,
            hooks,
            injector,
            installer,
            runtime_options: RwLock::new(Value::Null),
            config: RwLock::new(None),
            connections: RwLock::new(Vec::new()),
            info: RwLock::new(Value::Null),
        }
    }

    /// Identifier of this launch.
    pub fn boot_id(&self) -> Uuid {
        self.boot_id
    }

    /// Options passed to `launch`. Forwarded to plugins as runtime options.
    pub fn options(&self) -> &Value {
        &self.options
    }

    /// Dependency state of every declared plugin.
    pub fn dependencies(&self) -> &Arc<DependencyRegistry> {
        &self.dependencies
    }

    /// Stage and auxiliary hook handlers.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Services filled in by `inject-dependencies`.
    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    /// The orchestrator's installer, sharing its dependency timeout.
    pub fn installer(&self) -> &Arc<PluginInstaller> {
        &self.installer
    }

    /// Options produced by `configure-runtime`. Hosts read their bind
    /// settings from here.
    pub fn runtime_options(&self) -> Value {
        self.runtime_options.read().clone()
    }

    /// Stores the result of `configure-runtime`.
    pub fn set_runtime_options(&self, options: Value) {
        *self.runtime_options.write() = options;
    }

    /// The attached configuration, if any.
    pub fn config(&self) -> Option<Arc<BootConfig>> {
        self.config.read().clone()
    }

    /// The attached configuration, or a configuration error.
    pub fn require_config(&self) -> BootResult<Arc<BootConfig>> {
        self.config().ok_or_else(|| {
            BootError::configuration(
                "no boot configuration available, it must be resolved by register-early-extensions",
            )
        })
    }

    /// Attaches the resolved configuration, replacing any previous one.
    pub fn attach_config(&self, config: BootConfig) -> Arc<BootConfig> {
        let config = Arc::new(config);
        *self.config.write() = Some(Arc::clone(&config));
        config
    }

    /// Configuration as JSON, `null` when none is attached.
    pub fn config_value(&self) -> Value {
        self.config()
            .and_then(|config| serde_json::to_value(config.as_ref()).ok())
            .unwrap_or(Value::Null)
    }

    /// Connections opened by `register-connections`.
    pub fn connections(&self) -> Vec<ConnectionSpec> {
        self.connections.read().clone()
    }

    /// Records the connections the host opened.
    pub fn set_connections(&self, connections: Vec<ConnectionSpec>) {
        *self.connections.write() = connections;
    }

    /// Runtime info reported by `start`.
    pub fn info(&self) -> Value {
        self.info.read().clone()
    }

    /// Stores the runtime info returned by `start`.
    pub fn set_info(&self, info: Value) {
        *self.info.write() = info;
    }
}
