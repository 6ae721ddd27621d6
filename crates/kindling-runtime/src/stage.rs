//! Boot stages and their hook keys.

use std::fmt;

use serde::Serialize;

/// Auxiliary hook fired before `register-connections` to populate the injector.
pub const INJECT_DEPENDENCIES: &str = "inject-dependencies";

/// Auxiliary hook that may rewrite the planned connections. It has no default.
pub const CONFIGURE_CONNECTIONS: &str = "configure-connections";

/// One step of the boot sequence. Every stage is a hook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Produces the runtime options.
    ConfigureRuntime,
    /// Resolves the boot configuration.
    RegisterEarlyExtensions,
    /// Opens the listening connections.
    RegisterConnections,
    /// Installs security strategies.
    ConfigureSecurity,
    /// Installs API documentation.
    ConfigureDocumentation,
    /// Installs the framework plugins.
    RegisterPlugins,
    /// Host extensions that depend on the plugins.
    RegisterLateExtensions,
    /// Last step before the runtime starts.
    BeforeStart,
    /// Starts the runtime.
    Start,
    /// Runtime is up.
    Started,
}

impl Stage {
    /// All stages in execution order.
    pub const SEQUENCE: [Stage; 10] = [
        Stage::ConfigureRuntime,
        Stage::RegisterEarlyExtensions,
        Stage::RegisterConnections,
        Stage::ConfigureSecurity,
        Stage::ConfigureDocumentation,
        Stage::RegisterPlugins,
        Stage::RegisterLateExtensions,
        Stage::BeforeStart,
        Stage::Start,
        Stage::Started,
    ];

    /// Hook key of the stage.
    pub fn key(self) -> &'static str {
        match self {
            Self::ConfigureRuntime => "configure-runtime",
            Self::RegisterEarlyExtensions => "register-early-extensions",
            Self::RegisterConnections => "register-connections",
            Self::ConfigureSecurity => "configure-security",
            Self::ConfigureDocumentation => "configure-documentation",
            Self::RegisterPlugins => "register-plugins",
            Self::RegisterLateExtensions => "register-late-extensions",
            Self::BeforeStart => "before-start",
            Self::Start => "start",
            Self::Started => "started",
        }
    }

    /// Looks a stage up by hook key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::SEQUENCE.into_iter().find(|stage| stage.key() == key)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
