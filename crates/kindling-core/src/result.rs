//! Convenience result type alias for Kindling.

use crate::error::BootError;

/// A specialized `Result` type for boot operations.
pub type BootResult<T> = Result<T, BootError>;
