//! A single named dependency: a settle-once future plus registration metadata.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use kindling_core::error::BootError;

use crate::traits::Plugin;

/// Settlement state of a dependency entry.
#[derive(Debug, Clone)]
pub enum DependencyState {
    /// Nothing has settled the entry yet.
    Pending,
    /// The owner registered successfully.
    Fulfilled(Value),
    /// The owner failed to register.
    Rejected(BootError),
}

impl DependencyState {
    /// Whether the entry is still waiting to settle.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether the entry settled successfully.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Whether the entry settled with an error.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Short lowercase label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled(_) => "fulfilled",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Registration details recorded on an entry once its owner shows up.
#[derive(Debug, Default)]
struct EntryMetadata {
    version: Option<String>,
    implementation: Option<Arc<dyn Plugin>>,
    deps: Vec<String>,
    registrations: usize,
}

/// One entry of the [`DependencyRegistry`](super::DependencyRegistry).
///
/// The state lives in a `watch` channel: settling is a single
/// compare-and-set under the channel lock, and every receiver subscribed
/// before or after observes the settled value exactly once.
#[derive(Debug)]
pub struct DependencyEntry {
    name: String,
    state: watch::Sender<DependencyState>,
    waiting_since: DateTime<Utc>,
    metadata: Mutex<EntryMetadata>,
    activation_claimed: AtomicBool,
}

impl DependencyEntry {
    /// Creates a pending entry.
    pub(crate) fn new(name: &str) -> Self {
        let (state, _) = watch::channel(DependencyState::Pending);
        Self {
            name: name.to_string(),
            state,
            waiting_since: Utc::now(),
            metadata: Mutex::new(EntryMetadata::default()),
            activation_claimed: AtomicBool::new(false),
        }
    }

    /// The dependency name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the entry was created.
    pub fn waiting_since(&self) -> DateTime<Utc> {
        self.waiting_since
    }

    /// Current state.
    pub fn state(&self) -> DependencyState {
        self.state.borrow().clone()
    }

    /// Whether the entry is still pending.
    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Number of callers currently suspended on this entry.
    pub fn waiter_count(&self) -> usize {
        self.state.receiver_count()
    }

    /// Moves the entry out of `Pending`.
    pub(crate) fn settle(&self, next: DependencyState) -> Result<(), BootError> {
        let settled = self.state.send_if_modified(|current| {
            if current.is_pending() {
                *current = next;
                true
            } else {
                false
            }
        });

        if settled {
            Ok(())
        } else {
            Err(BootError::AlreadySettled {
                name: self.name.clone(),
            })
        }
    }

    /// Suspends until the entry leaves `Pending` and returns the settled state.
    pub async fn settled(&self) -> DependencyState {
        let mut rx = self.state.subscribe();
        let result = rx
            .wait_for(|state| !state.is_pending())
            .await
            .map(|state| state.clone());

        // The sender lives as long as `self`, so the channel cannot close here.
        result.unwrap_or_else(|_| {
            DependencyState::Rejected(BootError::internal(format!(
                "dependency channel for '{}' closed",
                self.name
            )))
        })
    }

    /// Records (or refreshes) the registration that owns this entry.
    ///
    /// Returns `true` when an earlier registration had already been recorded.
    pub(crate) fn record_registration(
        &self,
        version: &str,
        implementation: Arc<dyn Plugin>,
        deps: &[String],
    ) -> bool {
        let mut metadata = self.metadata.lock();
        metadata.version = Some(version.to_string());
        metadata.implementation = Some(implementation);
        metadata.deps = deps.to_vec();
        metadata.registrations += 1;
        metadata.registrations > 1
    }

    /// Version of the owning registration, if it registered.
    pub fn version(&self) -> Option<String> {
        self.metadata.lock().version.clone()
    }

    /// Implementation of the owning registration, if it registered.
    pub fn implementation(&self) -> Option<Arc<dyn Plugin>> {
        self.metadata.lock().implementation.clone()
    }

    /// Dependencies declared by the owning registration.
    pub fn deps(&self) -> Vec<String> {
        self.metadata.lock().deps.clone()
    }

    /// Whether the owner has registered (as opposed to a forward placeholder).
    pub fn is_registered(&self) -> bool {
        self.metadata.lock().registrations > 0
    }

    /// Claims the right to activate this entry's owner. Only the first caller wins.
    pub(crate) fn claim_activation(&self) -> bool {
        !self.activation_claimed.swap(true, Ordering::AcqRel)
    }

    /// Gives the activation claim back so a later install can take it.
    pub(crate) fn release_activation(&self) {
        self.activation_claimed.store(false, Ordering::Release);
    }
}
