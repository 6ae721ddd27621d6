//! Plugin installer — activates plugins once their dependencies are fulfilled.
//!
//! Installing a plugin:
//! 1. Reuses (or creates) the plugin's own dependency entry and records the
//!    registration metadata on it.
//! 2. Waits, bounded, for every declared dependency to be fulfilled.
//! 3. Hands the plugin to the host's [`PluginActivator`].
//! 4. Settles its own entry, fulfilled on success and rejected on any
//!    failure, so that dependants are released either way.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn};

use kindling_core::error::BootError;
use kindling_core::result::BootResult;

use crate::deps::{DependencyEntry, DependencyRegistry, DependencyState};
use crate::traits::{PluginActivator, Registration};

/// Dependency wait bound used when none is configured.
pub const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Installs plugins in dependency order regardless of registration order.
///
/// Clones share the registry, the activator and the timeout: a timeout set
/// through one clone applies to all of them.
#[derive(Clone)]
pub struct PluginInstaller {
    registry: Arc<DependencyRegistry>,
    activator: Arc<dyn PluginActivator>,
    timeout: Arc<RwLock<Duration>>,
}

/// Held by the install that owns an entry's activation. Dropping it while
/// the entry is still pending (the install future was cancelled) gives the
/// claim back so a later install can activate the plugin.
struct ActivationClaim {
    entry: Arc<DependencyEntry>,
}

impl Drop for ActivationClaim {
    fn drop(&mut self) {
        if self.entry.is_pending() {
            self.entry.release_activation();
            debug!(plugin = %self.entry.name(), "Install abandoned, activation claim released");
        }
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for PluginInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstaller")
            .field("registry", &self.registry)
            .field("timeout", &self.timeout())
            .finish()
    }
}

impl PluginInstaller {
    /// Creates an installer with the default dependency timeout.
    pub fn new(registry: Arc<DependencyRegistry>, activator: Arc<dyn PluginActivator>) -> Self {
        Self {
            registry,
            activator,
            timeout: Arc::new(RwLock::new(DEFAULT_DEPENDENCY_TIMEOUT)),
        }
    }

    /// Overrides the dependency timeout. A zero duration falls back to the default.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }

    /// Changes the dependency timeout for this installer and its clones.
    /// Installs already waiting keep the bound they started with.
    pub fn set_timeout(&self, timeout: Duration) {
        let timeout = if timeout.is_zero() {
            DEFAULT_DEPENDENCY_TIMEOUT
        } else {
            timeout
        };
        *self.timeout.write() = timeout;
        debug!(timeout_ms = as_millis(timeout), "Dependency timeout set");
    }

    /// The dependency timeout in effect.
    pub fn timeout(&self) -> Duration {
        *self.timeout.read()
    }

    /// The registry this installer settles entries in.
    pub fn registry(&self) -> &Arc<DependencyRegistry> {
        &self.registry
    }

    /// Installs one plugin.
    ///
    /// Installing a plugin whose entry is already fulfilled only refreshes
    /// its metadata. Installing one whose activation is already in flight
    /// waits, bounded by the dependency timeout, for that activation and
    /// reports its outcome.
    pub async fn install(&self, registration: Registration) -> BootResult<()> {
        let name = registration.name.clone();
        let deps = registration.dependency_names();
        let timeout = self.timeout();
        debug!(plugin = %name, version = %registration.version, "Installing plugin");

        let (entry, created) = self.registry.declare_entry(&name);
        let reregistered = entry.record_registration(
            &registration.version,
            Arc::clone(&registration.implementation),
            &deps,
        );
        if created {
            trace!(plugin = %name, "Plugin entry did not exist, created it");
        } else {
            trace!(
                plugin = %name,
                reregistered,
                "Plugin was already pre-registered, updating implementation and version only"
            );
        }

        match entry.state() {
            DependencyState::Fulfilled(_) => {
                info!(plugin = %name, "Plugin already active, registration updated");
                return Ok(());
            }
            DependencyState::Rejected(err) => return Err(err),
            DependencyState::Pending => {}
        }

        if !entry.claim_activation() {
            debug!(plugin = %name, "Plugin activation already in flight, waiting for it");
            return match tokio::time::timeout(timeout, entry.settled()).await {
                Ok(DependencyState::Rejected(err)) => Err(err),
                Ok(_) => Ok(()),
                Err(_) => {
                    warn!(plugin = %name, "In-flight activation did not settle in time");
                    Err(BootError::DependencyTimeout {
                        plugin: name.clone(),
                        outstanding: vec![name],
                        timeout_ms: as_millis(timeout),
                    })
                }
            };
        }
        let _claim = ActivationClaim {
            entry: Arc::clone(&entry),
        };

        if deps.iter().any(|dep| dep == &name) {
            let err = BootError::configuration(format!("plugin '{name}' depends on itself"));
            self.settle_rejected(&name, err.clone());
            return Err(err);
        }

        if let Err(err) = self.registry.await_all(&name, &deps, timeout).await {
            error!(
                plugin = %name,
                deps = ?deps,
                unmet = ?err.unmet_dependencies(),
                error = %err,
                "Unable to install plugin, dependencies were not met"
            );
            self.dump_pending();
            self.settle_rejected(&name, err.clone());
            return Err(err);
        }

        trace!(plugin = %name, "Plugin dependencies are all resolved");

        match self.activator.activate(&registration).await {
            Ok(value) => {
                self.registry.fulfill(&name, value)?;
                info!(plugin = %name, version = %registration.version, "Plugin installed");
                Ok(())
            }
            Err(err) => {
                let err = match err {
                    BootError::ActivationFailed { .. } => err,
                    other => BootError::activation(&name, other.to_string()),
                };
                error!(plugin = %name, error = %err, "Unable to register plugin");
                self.settle_rejected(&name, err.clone());
                Err(err)
            }
        }
    }

    /// Installs every registration concurrently and reports each outcome
    /// once all of them have settled.
    pub async fn install_all(
        &self,
        registrations: Vec<Registration>,
    ) -> Vec<(String, BootResult<()>)> {
        let installs = registrations.into_iter().map(|registration| async move {
            let name = registration.name.clone();
            let outcome = self.install(registration).await;
            (name, outcome)
        });
        futures::future::join_all(installs).await
    }

    /// Logs every pending entry with the dependencies it still waits on.
    pub fn dump_pending(&self) {
        let pending = self.registry.pending_report();
        error!(count = pending.len(), "Dumping pending plugin state");
        for item in &pending {
            error!(
                plugin = %item.name,
                waiting_since = %item.waiting_since,
                outstanding = ?item.outstanding_deps,
                "Plugin still pending"
            );
        }
    }

    fn settle_rejected(&self, name: &str, err: BootError) {
        if let Err(settle_err) = self.registry.reject(name, err) {
            warn!(plugin = %name, error = %settle_err, "Could not reject plugin entry");
        }
    }
}
