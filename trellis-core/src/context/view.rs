//! Read-Only Context Views
//!
//! When a provider answers a discovery request it does not hand out the
//! state manager itself; it hands out a `ContextView`, a capability
//! exposing only the snapshot and subscribe operations. Updater fields are
//! filtered out of the view's snapshots, so mutation rights stay with the
//! provider.
//!
//! One view is constructed per `provide()` registration and shared, by
//! reference, with every consumer that discovers it.

use std::sync::Arc;

use crate::reactive::Subscription;
use crate::state::{Snapshot, StateManager};

/// Read-only capability over a providing state manager.
#[derive(Clone)]
pub struct ContextView {
    manager: StateManager,
}

impl ContextView {
    pub(crate) fn new(manager: StateManager) -> Self {
        Self { manager }
    }

    /// The provider's current snapshot, restricted to non-updater fields.
    ///
    /// Unlike [`StateManager::value`], views rebuild on every read; the
    /// referential-stability guarantee belongs to the owning manager's
    /// accessor, not to the restricted wrapper.
    pub fn value(&self) -> Arc<Snapshot> {
        Arc::new(self.manager.read_only_snapshot())
    }

    /// Subscribe to the provider's batched change notifications.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.manager.subscribe(callback)
    }

    /// Whether two views expose the same providing manager.
    pub fn same_provider(&self, other: &ContextView) -> bool {
        self.manager.same(&other.manager)
    }
}

impl std::fmt::Debug for ContextView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextView")
            .field("variety", &self.manager.variety())
            .finish()
    }
}
