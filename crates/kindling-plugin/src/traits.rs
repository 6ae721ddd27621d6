//! Plugin, registration, and activation contracts.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kindling_core::error::BootError;
use kindling_core::result::BootResult;

/// A unit of functionality installed into the hosting runtime.
///
/// The installer never calls into a plugin itself; it hands the plugin to a
/// [`PluginActivator`] once every dependency is fulfilled.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Registers the plugin with its host. The returned value becomes the
    /// fulfilled value of the plugin's dependency entry.
    async fn register(&self, options: &Value) -> Result<Value, String>;
}

/// Per-registration options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginOptions {
    /// Dependencies, used when the registration has no explicit list.
    #[serde(default)]
    pub deps: Option<Vec<String>>,
    /// Options forwarded to the host when activating the plugin.
    #[serde(default)]
    pub runtime: Value,
}

/// Everything the installer needs to install one plugin.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Unique plugin name; also the name of its dependency entry.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// The plugin itself.
    pub implementation: Arc<dyn Plugin>,
    /// Explicit dependencies. Takes precedence over `options.deps`.
    pub deps: Option<Vec<String>>,
    /// Registration options.
    pub options: PluginOptions,
}

impl Registration {
    /// Creates a registration with no dependencies.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        implementation: Arc<dyn Plugin>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            implementation,
            deps: None,
            options: PluginOptions::default(),
        }
    }

    /// Sets the explicit dependency list.
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = Some(deps.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the registration options.
    pub fn with_options(mut self, options: PluginOptions) -> Self {
        self.options = options;
        self
    }

    /// Dependency names: explicit list, else `options.deps`, else none.
    pub fn dependency_names(&self) -> Vec<String> {
        self.deps
            .clone()
            .or_else(|| self.options.deps.clone())
            .unwrap_or_default()
    }
}

/// The hosting runtime's registration mechanism.
#[async_trait]
pub trait PluginActivator: Send + Sync {
    /// Activates the plugin, resolving once it is fully active.
    async fn activate(&self, registration: &Registration) -> BootResult<Value>;
}

/// Activator that calls [`Plugin::register`] with the runtime options.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectActivator;

#[async_trait]
impl PluginActivator for DirectActivator {
    async fn activate(&self, registration: &Registration) -> BootResult<Value> {
        registration
            .implementation
            .register(&registration.options.runtime)
            .await
            .map_err(|message| BootError::activation(&registration.name, message))
    }
}
