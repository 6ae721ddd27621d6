//! # kindling-plugin
//!
//! Plugin plumbing for Kindling. Provides:
//!
//! - A dependency registry of per-name futures that plugins fulfil when they
//!   finish registering, with forward references and bounded waits
//! - A plugin installer that activates a plugin only once its dependencies
//!   are fulfilled
//! - A hook registry whose handlers can replace or chain a caller-supplied
//!   default implementation
//! - A keyed service injector

pub mod deps;
pub mod hooks;
pub mod injector;
pub mod installer;
pub mod prelude;
pub mod traits;

pub use deps::{DependencyEntry, DependencyRegistry, DependencyState, PendingDependency};
pub use hooks::{DefaultImpl, ExtensionPoint, HookHandler, HookRegistry};
pub use injector::Injector;
pub use installer::{DEFAULT_DEPENDENCY_TIMEOUT, PluginInstaller};
pub use traits::{DirectActivator, Plugin, PluginActivator, PluginOptions, Registration};
