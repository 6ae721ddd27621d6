//! Dependency registry — keyed store of settle-once dependency entries.
//!
//! Plugins use it in two directions: an installer fulfils (or rejects) the
//! entry named after the plugin it installs, and any plugin may wait on the
//! entries of the plugins it depends on. Waiting on a name nobody has
//! registered yet creates a pending placeholder (a forward reference) that
//! the owner later reuses.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use kindling_core::error::BootError;
use kindling_core::result::BootResult;

use super::entry::{DependencyEntry, DependencyState};

/// Point-in-time view of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot {
    /// Entry name.
    pub name: String,
    /// `pending`, `fulfilled` or `rejected`.
    pub state: String,
    /// Version of the owning registration, if any.
    pub version: Option<String>,
    /// Entry creation time.
    pub waiting_since: DateTime<Utc>,
    /// Callers currently suspended on the entry.
    pub waiters: usize,
}

/// Diagnostic record for an entry that is still pending.
#[derive(Debug, Clone, Serialize)]
pub struct PendingDependency {
    /// Entry name.
    pub name: String,
    /// Entry creation time.
    pub waiting_since: DateTime<Utc>,
    /// Dependencies declared by the owner that are not fulfilled yet.
    /// Empty for placeholders whose owner never registered.
    pub outstanding_deps: Vec<String>,
}

/// Registry of named dependency entries.
///
/// Each registry instance is independent; a boot owns one and passes it to
/// everything that needs it.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    entries: DashMap<String, Arc<DependencyEntry>>,
}

impl DependencyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `name`, creating a pending placeholder if absent.
    pub fn declare(&self, name: &str) -> Arc<DependencyEntry> {
        self.declare_entry(name).0
    }

    /// Like [`declare`](Self::declare), also reporting whether the entry was
    /// created by this call.
    pub fn declare_entry(&self, name: &str) -> (Arc<DependencyEntry>, bool) {
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
            Entry::Vacant(vacant) => {
                let entry = Arc::new(DependencyEntry::new(name));
                vacant.insert(Arc::clone(&entry));
                debug!(dependency = %name, "Dependency entry created");
                (entry, true)
            }
        }
    }

    /// Returns an existing entry.
    pub fn get(&self, name: &str) -> Option<Arc<DependencyEntry>> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the state of an existing entry.
    pub fn state(&self, name: &str) -> Option<DependencyState> {
        self.get(name).map(|entry| entry.state())
    }

    /// Whether an entry exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fulfils `name` with `value`, releasing every waiter.
    pub fn fulfill(&self, name: &str, value: Value) -> BootResult<()> {
        self.declare(name)
            .settle(DependencyState::Fulfilled(value))
            .inspect(|_| debug!(dependency = %name, "Dependency fulfilled"))
            .inspect_err(|_| warn!(dependency = %name, "Fulfil ignored, entry already settled"))
    }

    /// Rejects `name` with `error`, releasing every waiter.
    pub fn reject(&self, name: &str, error: BootError) -> BootResult<()> {
        self.declare(name)
            .settle(DependencyState::Rejected(error))
            .inspect(|_| debug!(dependency = %name, "Dependency rejected"))
            .inspect_err(|_| warn!(dependency = %name, "Reject ignored, entry already settled"))
    }

    /// Waits until every entry in `names` is fulfilled and returns their
    /// values in request order.
    ///
    /// Fails fast with `DependencyFailed` on the first rejected entry, and
    /// with `DependencyTimeout` listing the still-pending names once
    /// `timeout` elapses. Timing out leaves the awaited entries untouched.
    /// `waiter` labels the caller in errors and logs.
    pub async fn await_all(
        &self,
        waiter: &str,
        names: &[String],
        timeout: Duration,
    ) -> BootResult<Vec<Value>> {
        let entries: Vec<Arc<DependencyEntry>> =
            names.iter().map(|name| self.declare(name)).collect();

        if entries.is_empty() {
            return Ok(Vec::new());
        }

        debug!(plugin = %waiter, deps = ?names, "Waiting for dependencies");

        let waits = entries.iter().map(|entry| {
            let entry = Arc::clone(entry);
            let waiter = waiter.to_string();
            async move {
                match entry.settled().await {
                    DependencyState::Fulfilled(value) => Ok(value),
                    DependencyState::Rejected(cause) => Err(BootError::DependencyFailed {
                        plugin: waiter,
                        dependency: entry.name().to_string(),
                        cause: Arc::new(cause),
                    }),
                    DependencyState::Pending => Err(BootError::internal(format!(
                        "dependency '{}' released while pending",
                        entry.name()
                    ))),
                }
            }
        });

        match tokio::time::timeout(timeout, futures::future::try_join_all(waits)).await {
            Ok(Ok(values)) => {
                info!(plugin = %waiter, "All dependencies resolved");
                Ok(values)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                let outstanding: Vec<String> = entries
                    .iter()
                    .filter(|entry| entry.is_pending())
                    .map(|entry| entry.name().to_string())
                    .collect();
                Err(BootError::DependencyTimeout {
                    plugin: waiter.to_string(),
                    outstanding,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Snapshot of every entry, sorted by name.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        let mut snapshot: Vec<EntrySnapshot> = self
            .entries
            .iter()
            .map(|entry| {
                let entry = entry.value();
                EntrySnapshot {
                    name: entry.name().to_string(),
                    state: entry.state().label().to_string(),
                    version: entry.version(),
                    waiting_since: entry.waiting_since(),
                    waiters: entry.waiter_count(),
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot
    }

    /// Every pending entry with the dependencies it is still waiting on,
    /// oldest first.
    pub fn pending_report(&self) -> Vec<PendingDependency> {
        let pending: Vec<Arc<DependencyEntry>> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_pending())
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut report: Vec<PendingDependency> = pending
            .into_iter()
            .map(|entry| PendingDependency {
                name: entry.name().to_string(),
                waiting_since: entry.waiting_since(),
                outstanding_deps: entry
                    .deps()
                    .into_iter()
                    .filter(|dep| !self.state(dep).is_some_and(|s| s.is_fulfilled()))
                    .collect(),
            })
            .collect();
        report.sort_by(|a, b| {
            a.waiting_since
                .cmp(&b.waiting_since)
                .then_with(|| a.name.cmp(&b.name))
        });
        report
    }
}
