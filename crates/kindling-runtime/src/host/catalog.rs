//! Named framework plugins a host can install.

use std::collections::HashMap;
use std::sync::Arc;

use kindling_plugin::prelude::*;

/// A plugin known to the catalog.
#[derive(Debug, Clone)]
struct CatalogEntry {
    version: String,
    deps: Vec<String>,
    plugin: Arc<dyn Plugin>,
}

/// Maps framework plugin names to implementations.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl PluginCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in `system` and `status` plugins.
    pub fn with_builtins() -> Self {
        let version = env!("CARGO_PKG_VERSION");
        Self::new()
            .with("system", version, Vec::<String>::new(), Arc::new(SystemPlugin))
            .with("status", version, ["system"], Arc::new(StatusPlugin))
    }

    /// Adds (or replaces) a plugin.
    pub fn with<I, S>(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        deps: I,
        plugin: Arc<dyn Plugin>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            name.into(),
            CatalogEntry {
                version: version.into(),
                deps: deps.into_iter().map(Into::into).collect(),
                plugin,
            },
        );
        self
    }

    /// Whether a plugin named `name` is known.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Known plugin names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds registrations for `names`, in order. Unknown names are a
    /// configuration error.
    pub fn resolve(&self, names: &[String]) -> BootResult<Vec<Registration>> {
        names
            .iter()
            .map(|name| {
                let entry = self.entries.get(name).ok_or_else(|| {
                    BootError::configuration(format!("unknown framework plugin '{name}'"))
                })?;
                Ok(
                    Registration::new(name.as_str(), entry.version.as_str(), Arc::clone(&entry.plugin))
                        .with_deps(entry.deps.iter().cloned()),
                )
            })
            .collect()
    }
}

/// Reports the framework identity.
#[derive(Debug)]
pub struct SystemPlugin;

#[async_trait]
impl Plugin for SystemPlugin {
    async fn register(&self, options: &Value) -> Result<Value, String> {
        Ok(json!({
            "name": "kindling",
            "version": env!("CARGO_PKG_VERSION"),
            "test_mode": options.get("test_mode").and_then(Value::as_bool).unwrap_or(false),
        }))
    }
}

/// Health reporting, requires `system`.
#[derive(Debug)]
pub struct StatusPlugin;

#[async_trait]
impl Plugin for StatusPlugin {
    async fn register(&self, _options: &Value) -> Result<Value, String> {
        Ok(json!({ "healthy": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve_with_deps() {
        let catalog = PluginCatalog::with_builtins();
        assert_eq!(catalog.names(), vec!["status", "system"]);

        let registrations = catalog
            .resolve(&["status".to_string(), "system".to_string()])
            .unwrap();
        assert_eq!(registrations[0].name, "status");
        assert_eq!(registrations[0].dependency_names(), vec!["system"]);
        assert!(registrations[1].dependency_names().is_empty());
    }

    #[test]
    fn test_unknown_plugin_is_configuration_error() {
        let err = PluginCatalog::with_builtins()
            .resolve(&["metrics".to_string()])
            .unwrap_err();
        assert!(matches!(err, BootError::Configuration(ref m) if m.contains("metrics")));
    }

    #[tokio::test]
    async fn test_system_plugin_reads_test_mode() {
        let value = SystemPlugin
            .register(&json!({"test_mode": true}))
            .await
            .unwrap();
        assert_eq!(value["test_mode"], json!(true));
        assert_eq!(value["name"], json!("kindling"));
    }
}
