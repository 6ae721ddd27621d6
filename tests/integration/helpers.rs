//! Shared test helpers for integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;

use kindling_plugin::Plugin;
use kindling_runtime::{Orchestrator, PluginCatalog, TcpHost};

/// One plugin activation as seen by [`TracingPlugin`].
#[derive(Debug, Clone)]
pub struct Activation {
    /// Plugin name.
    pub name: String,
    /// When `register` was entered.
    pub started: Instant,
    /// When `register` returned successfully.
    pub finished: Option<Instant>,
}

/// Shared activation log.
#[derive(Debug, Clone, Default)]
pub struct ActivationLog(Arc<Mutex<Vec<Activation>>>);

impl ActivationLog {
    pub fn get(&self, name: &str) -> Option<Activation> {
        self.0.lock().iter().find(|a| a.name == name).cloned()
    }

    /// Plugin names in activation start order.
    pub fn order(&self) -> Vec<String> {
        self.0.lock().iter().map(|a| a.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn started(&self, name: &str) {
        self.0.lock().push(Activation {
            name: name.to_string(),
            started: Instant::now(),
            finished: None,
        });
    }

    fn finished(&self, name: &str) {
        if let Some(activation) = self.0.lock().iter_mut().find(|a| a.name == name) {
            activation.finished = Some(Instant::now());
        }
    }
}

/// A plugin that records its activation, optionally takes some time to
/// activate, and optionally fails.
#[derive(Debug)]
pub struct TracingPlugin {
    name: String,
    log: ActivationLog,
    delay: Duration,
    failure: Option<String>,
}

impl TracingPlugin {
    pub fn new(name: &str, log: &ActivationLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            delay: Duration::ZERO,
            failure: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

#[async_trait]
impl Plugin for TracingPlugin {
    async fn register(&self, options: &Value) -> Result<Value, String> {
        self.log.started(&self.name);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(message.clone());
        }
        self.log.finished(&self.name);
        Ok(json!({ "plugin": self.name, "options": options }))
    }
}

/// Launch options with a loopback, ephemeral-port server configuration.
/// Top-level sections of `extra` replace the defaults.
pub fn launch_options(framework: &[&str], extra: Value) -> Value {
    let mut config = json!({
        "server": { "host": "127.0.0.1", "port": 0 },
        "plugins": { "framework": framework, "dependency_timeout_ms": 1000 },
    });
    if let (Some(config), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
        for (section, value) in extra {
            config.insert(section.clone(), value.clone());
        }
    }
    json!({ "config": config, "test_mode": true })
}

/// Adds the `core`, `security` (needs core) and `admin` (needs core and
/// security) plugins to `catalog`.
pub fn with_fan_out(catalog: PluginCatalog, log: &ActivationLog) -> PluginCatalog {
    catalog
        .with("core", "1.0.0", Vec::<String>::new(), Arc::new(TracingPlugin::new("core", log)))
        .with("security", "1.0.0", ["core"], Arc::new(TracingPlugin::new("security", log)))
        .with(
            "admin",
            "1.0.0",
            ["core", "security"],
            Arc::new(TracingPlugin::new("admin", log)),
        )
}

/// A TCP host plus the orchestrator driving it.
pub struct TestApp {
    pub host: Arc<TcpHost>,
    pub orchestrator: Orchestrator,
    pub log: ActivationLog,
}

impl TestApp {
    /// Built-in plugins plus the fan-out plugins.
    pub fn new() -> Self {
        Self::with_catalog(with_fan_out)
    }

    /// Builds the app from the built-in catalog as extended by `customize`.
    pub fn with_catalog<F>(customize: F) -> Self
    where
        F: FnOnce(PluginCatalog, &ActivationLog) -> PluginCatalog,
    {
        let log = ActivationLog::default();
        let catalog = customize(PluginCatalog::with_builtins(), &log);
        let host = Arc::new(TcpHost::new(catalog));
        let orchestrator = Orchestrator::new(host.clone());
        Self {
            host,
            orchestrator,
            log,
        }
    }
}
