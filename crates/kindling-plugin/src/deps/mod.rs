//! Dependency registry — per-name futures for plugin registration.

pub mod entry;
pub mod registry;

pub use entry::{DependencyEntry, DependencyState};
pub use registry::{DependencyRegistry, EntrySnapshot, PendingDependency};
