//! Default implementations and the extension point calling contract.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::trace;

use kindling_core::error::BootError;
use kindling_core::result::BootResult;

use super::registry::HookHandler;

/// Future returned by hook handlers and default implementations.
pub type HookFuture = BoxFuture<'static, BootResult<Value>>;

type DefaultFn = Arc<dyn Fn(Value) -> HookFuture + Send + Sync>;

/// The caller-supplied behavior of an extension point.
///
/// Handlers receive it as a value: calling it chains the default behavior,
/// ignoring it replaces that behavior. An empty `DefaultImpl` behaves as the
/// identity and resolves with the params it was given.
#[derive(Clone, Default)]
pub struct DefaultImpl(Option<DefaultFn>);

impl DefaultImpl {
    /// Wraps an async closure as a default implementation.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BootResult<Value>> + Send + 'static,
    {
        Self(Some(Arc::new(move |params| -> HookFuture { Box::pin(f(params)) })))
    }

    /// No default implementation.
    pub fn none() -> Self {
        Self(None)
    }

    /// Whether a default implementation is present.
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Runs the default implementation, or returns `params` when there is none.
    pub async fn call(&self, params: Value) -> BootResult<Value> {
        match &self.0 {
            Some(f) => f(params).await,
            None => Ok(params),
        }
    }
}

impl std::fmt::Debug for DefaultImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DefaultImpl")
            .field(&if self.is_set() { "<closure>" } else { "<none>" })
            .finish()
    }
}

/// A resolved hook key: the registered handler (if any) and the default.
#[derive(Debug)]
pub struct ExtensionPoint {
    key: String,
    handler: Option<Arc<dyn HookHandler>>,
    default: DefaultImpl,
}

impl ExtensionPoint {
    /// Creates an extension point.
    pub fn new(
        key: impl Into<String>,
        handler: Option<Arc<dyn HookHandler>>,
        default: DefaultImpl,
    ) -> Self {
        Self {
            key: key.into(),
            handler,
            default,
        }
    }

    /// The hook key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a registered handler overrides the default.
    pub fn is_overridden(&self) -> bool {
        self.handler.is_some()
    }

    /// Invokes the handler with the default injected, else the default,
    /// else resolves with `params` unchanged.
    ///
    /// A panic raised by the handler or the default becomes
    /// `HookExecutionFailed`; an `Err` they return is passed through as is.
    pub async fn invoke(self, params: Value) -> BootResult<Value> {
        let outcome = match self.handler {
            Some(handler) => {
                trace!(hook = %self.key, "Registered hook will be used");
                AssertUnwindSafe(handler.handle(params, self.default))
                    .catch_unwind()
                    .await
            }
            None if self.default.is_set() => {
                trace!(hook = %self.key, "No registered hook, using default implementation");
                AssertUnwindSafe(self.default.call(params))
                    .catch_unwind()
                    .await
            }
            None => {
                trace!(hook = %self.key, "No hook and no default, passing params through");
                return Ok(params);
            }
        };

        outcome.unwrap_or_else(|panic| Err(BootError::hook(&self.key, panic_message(&*panic))))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
