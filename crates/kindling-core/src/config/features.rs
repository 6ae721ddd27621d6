//! Optional boot stage toggles.

use serde::{Deserialize, Serialize};

/// Feature flags selecting which optional stages do real work.
///
/// A disabled feature turns the default implementation of its stage into a
/// no-op; a registered hook for the stage still runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Run the host's security configuration.
    #[serde(default)]
    pub security: bool,
    /// Run the host's documentation configuration.
    #[serde(default)]
    pub documentation: bool,
}
