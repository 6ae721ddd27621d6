//! Hook registry — one overriding handler per named extension point.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info};

use kindling_core::result::BootResult;

use super::definitions::{DefaultImpl, ExtensionPoint, HookFuture};

/// Trait for hook handler implementations.
#[async_trait]
pub trait HookHandler: Send + Sync + std::fmt::Debug {
    /// Handles a hook invocation.
    ///
    /// `default` is the caller's default implementation. Call it to run the
    /// default behavior (and post-process its result), or ignore it to
    /// replace that behavior entirely.
    async fn handle(&self, params: Value, default: DefaultImpl) -> BootResult<Value>;
}

/// A closure-based hook handler for quick handler creation.
pub struct ClosureHandler {
    handler: Arc<dyn Fn(Value, DefaultImpl) -> HookFuture + Send + Sync>,
}

impl std::fmt::Debug for ClosureHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureHandler")
            .field("handler", &"<closure>")
            .finish()
    }
}

impl ClosureHandler {
    /// Creates a new closure-based handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value, DefaultImpl) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BootResult<Value>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |params, default| -> HookFuture {
                Box::pin(handler(params, default))
            }),
        }
    }
}

#[async_trait]
impl HookHandler for ClosureHandler {
    async fn handle(&self, params: Value, default: DefaultImpl) -> BootResult<Value> {
        (self.handler)(params, default).await
    }
}

/// Registry of hook handlers keyed by extension point name.
///
/// Registering a key that already has a handler replaces it, so embedding
/// applications and test harnesses can override framework defaults.
#[derive(Debug, Default)]
pub struct HookRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn HookHandler>>>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `key`, replacing any previous one.
    pub async fn register(&self, key: impl Into<String>, handler: Arc<dyn HookHandler>) {
        let key = key.into();
        let replaced = self
            .handlers
            .write()
            .await
            .insert(key.clone(), handler)
            .is_some();
        debug!(hook = %key, replaced, "Hook handler registered");
    }

    /// Registers a closure as the handler for `key`.
    pub async fn register_fn<F, Fut>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(Value, DefaultImpl) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BootResult<Value>> + Send + 'static,
    {
        self.register(key, Arc::new(ClosureHandler::new(handler)))
            .await;
    }

    /// Registers several handlers at once.
    pub async fn register_all<I, K>(&self, hooks: I) -> usize
    where
        I: IntoIterator<Item = (K, Arc<dyn HookHandler>)>,
        K: Into<String>,
    {
        let mut count = 0;
        for (key, handler) in hooks {
            self.register(key, handler).await;
            count += 1;
        }
        info!(count, "Hooks registered");
        count
    }

    /// Removes the handler for `key`, returning it.
    pub async fn unregister(&self, key: &str) -> Option<Arc<dyn HookHandler>> {
        let removed = self.handlers.write().await.remove(key);
        if removed.is_some() {
            debug!(hook = %key, "Hook handler unregistered");
        }
        removed
    }

    /// Whether a handler is registered for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.handlers.read().await.contains_key(key)
    }

    /// All registered keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered handlers.
    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Whether no handler is registered.
    pub async fn is_empty(&self) -> bool {
        self.handlers.read().await.is_empty()
    }

    /// Resolves `key` into an [`ExtensionPoint`] pairing its handler with `default`.
    pub async fn extension_point(&self, key: &str, default: DefaultImpl) -> ExtensionPoint {
        let handler = self.handlers.read().await.get(key).cloned();
        ExtensionPoint::new(key, handler, default)
    }

    /// Calls the extension point `key`.
    ///
    /// Runs the registered handler with `default` injected; without a
    /// handler runs `default`; without either resolves with `params`.
    pub async fn call(&self, key: &str, params: Value, default: DefaultImpl) -> BootResult<Value> {
        debug!(hook = %key, "Calling hook");
        self.extension_point(key, default).await.invoke(params).await
    }

    /// Calls `key` with empty params and a default implementation.
    pub async fn call_default(&self, key: &str, default: DefaultImpl) -> BootResult<Value> {
        self.call(key, json!({}), default).await
    }

    /// Calls `key` without a default implementation.
    pub async fn fire(&self, key: &str, params: Value) -> BootResult<Value> {
        self.call(key, params, DefaultImpl::none()).await
    }
}
