//! Unified boot error types for Kindling.
//!
//! Every crate maps its failures into [`BootError`] so that errors propagate
//! through the `?` operator from a plugin install all the way up to `launch`.
//! The type is `Clone` because a single rejected dependency is delivered to
//! every plugin waiting on it.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Top-level error kind categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A dependency did not settle in time.
    DependencyTimeout,
    /// A dependency settled as failed.
    DependencyFailed,
    /// The hosting runtime refused to activate a plugin.
    Activation,
    /// A dependency entry was settled twice.
    AlreadySettled,
    /// A hook handler or default implementation failed abnormally.
    Hook,
    /// A boot stage failed.
    Stage,
    /// The orchestrator was launched more than once.
    Lifecycle,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependencyTimeout => write!(f, "DEPENDENCY_TIMEOUT"),
            Self::DependencyFailed => write!(f, "DEPENDENCY_FAILED"),
            Self::Activation => write!(f, "ACTIVATION"),
            Self::AlreadySettled => write!(f, "ALREADY_SETTLED"),
            Self::Hook => write!(f, "HOOK"),
            Self::Stage => write!(f, "STAGE"),
            Self::Lifecycle => write!(f, "LIFECYCLE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout Kindling.
#[derive(Debug, Clone, Error)]
pub enum BootError {
    /// Some dependencies were still pending when the wait bound elapsed.
    #[error(
        "plugin '{plugin}' timed out after {timeout_ms}ms waiting on [{}]",
        .outstanding.join(", ")
    )]
    DependencyTimeout {
        /// Plugin (or caller label) that was waiting.
        plugin: String,
        /// Names still pending when the timeout fired.
        outstanding: Vec<String>,
        /// The bound that elapsed.
        timeout_ms: u64,
    },

    /// A dependency was rejected while the plugin was waiting on it.
    #[error("plugin '{plugin}' cannot start: dependency '{dependency}' failed: {cause}")]
    DependencyFailed {
        /// Plugin (or caller label) that was waiting.
        plugin: String,
        /// The rejected dependency.
        dependency: String,
        /// Why the dependency was rejected.
        #[source]
        cause: Arc<BootError>,
    },

    /// The hosting runtime rejected the plugin registration.
    #[error("activation of plugin '{plugin}' failed: {message}")]
    ActivationFailed {
        /// The plugin being activated.
        plugin: String,
        /// Reason reported by the host.
        message: String,
    },

    /// A dependency entry that already left `Pending` was settled again.
    #[error("dependency '{name}' is already settled")]
    AlreadySettled {
        /// The entry name.
        name: String,
    },

    /// A hook handler or default implementation panicked or failed abnormally.
    #[error("hook '{key}' failed: {message}")]
    HookExecutionFailed {
        /// The hook key.
        key: String,
        /// Failure description.
        message: String,
    },

    /// A boot stage failed; `source` is the original error.
    #[error("boot stage '{stage}' failed: {source}")]
    StageFailed {
        /// The stage key.
        stage: String,
        /// The error raised inside the stage.
        source: Arc<BootError>,
    },

    /// `launch` was called on an orchestrator that was already launched.
    #[error("orchestrator has already been launched")]
    AlreadyLaunched,

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BootError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DependencyTimeout { .. } => ErrorKind::DependencyTimeout,
            Self::DependencyFailed { .. } => ErrorKind::DependencyFailed,
            Self::ActivationFailed { .. } => ErrorKind::Activation,
            Self::AlreadySettled { .. } => ErrorKind::AlreadySettled,
            Self::HookExecutionFailed { .. } => ErrorKind::Hook,
            Self::StageFailed { .. } => ErrorKind::Stage,
            Self::AlreadyLaunched => ErrorKind::Lifecycle,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Create an activation error.
    pub fn activation(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActivationFailed {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create a hook execution error.
    pub fn hook(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookExecutionFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wrap an error raised inside a boot stage.
    pub fn stage(stage: impl Into<String>, source: BootError) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            source: Arc::new(source),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Strips any `StageFailed` wrappers and returns the innermost error.
    pub fn root_cause(&self) -> &BootError {
        match self {
            Self::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Names of the dependencies that kept a plugin from starting, if this
    /// error is dependency related.
    pub fn unmet_dependencies(&self) -> Vec<String> {
        match self.root_cause() {
            Self::DependencyTimeout { outstanding, .. } => outstanding.clone(),
            Self::DependencyFailed { dependency, .. } => vec![dependency.clone()],
            _ => Vec::new(),
        }
    }
}

impl From<serde_json::Error> for BootError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {err}"))
    }
}

impl From<config::ConfigError> for BootError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(format!("Configuration error: {err}"))
    }
}
