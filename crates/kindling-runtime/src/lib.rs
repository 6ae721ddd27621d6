//! # Kindling Runtime
//!
//! Boots a hosting runtime through a fixed sequence of hookable stages and
//! installs its framework plugins once their dependencies are met.

pub mod context;
pub mod host;
pub mod orchestrator;
pub mod stage;

pub use context::{BootContext, ConnectionSpec};
pub use host::{HostActivator, HostRuntime, PluginCatalog, TcpHost};
pub use orchestrator::{BootPhase, Orchestrator, RuntimeHandle};
pub use stage::Stage;
