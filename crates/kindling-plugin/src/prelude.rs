//! Prelude for plugin and host authors.

pub use async_trait::async_trait;
pub use kindling_core::{BootError, BootResult};
pub use serde_json::{Value, json};

pub use crate::hooks::{DefaultImpl, HookHandler};
pub use crate::traits::{Plugin, PluginActivator, PluginOptions, Registration};
