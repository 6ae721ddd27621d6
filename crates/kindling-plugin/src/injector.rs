//! Keyed service container shared with plugins during boot.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// Stores shared services by key; lookups are type checked.
#[derive(Default)]
pub struct Injector {
    deps: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("keys", &self.keys())
            .finish()
    }
}

impl Injector {
    /// Creates an empty injector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` under `key`, replacing any previous service.
    pub fn register<T>(&self, key: impl Into<String>, service: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let key = key.into();
        debug!(service = %key, "Service registered");
        self.deps.write().insert(key, service);
    }

    /// Returns the service under `key` if it exists and has type `T`.
    pub fn inject<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let service = self.deps.read().get(key).cloned()?;
        service.downcast::<T>().ok()
    }

    /// Whether a service exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.deps.read().contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.deps.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.deps.read().len()
    }

    /// Whether the injector is empty.
    pub fn is_empty(&self) -> bool {
        self.deps.read().is_empty()
    }
}
