//! # kindling-core
//!
//! Core crate for Kindling. Contains the unified boot error type and the
//! configuration schemas consumed by the runtime and its hosts.
//!
//! This crate has **no** internal dependencies on other Kindling crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::{BootError, ErrorKind};
pub use result::BootResult;
