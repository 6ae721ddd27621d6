//! Hook system — extension points with overridable default implementations.

pub mod definitions;
pub mod registry;

pub use definitions::{DefaultImpl, ExtensionPoint, HookFuture};
pub use registry::{ClosureHandler, HookHandler, HookRegistry};
