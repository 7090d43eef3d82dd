//! Consumer-Side Context Placeholders
//!
//! `from_context` (the context hook handed to state factories) returns a
//! `ContextCell` immediately, holding nothing. The actual discovery request
//! is deferred until the owning state manager is connected to a host node;
//! at that point the cell syncs to the provider's snapshot and stays in
//! sync through one standing subscription per connected node.
//!
//! The cell behaves as an ordinary signal member of its owning manager:
//! every provider notification marks the consumer's aggregate stale and
//! feeds its batching, with no re-subscription needed on the consumer side.

use std::sync::{Arc, RwLock};

use super::variety::Variety;
use super::view::ContextView;
use crate::reactive::{ReadSignal, SubscriberSet, Subscription, Value};
use crate::state::Snapshot;

/// Placeholder signal for context requested via the factory's context hook.
///
/// `value()` is `None` until the owning manager connects beneath a provider
/// of the requested variety.
pub struct ContextCell {
    inner: Arc<ContextCellInner>,
}

struct ContextCellInner {
    /// The variety this cell wants from the nearest ancestor.
    variety: Variety,

    /// Last snapshot received from the discovered provider.
    current: RwLock<Option<Arc<Snapshot>>>,

    /// Callbacks notified whenever the provider pushes a new snapshot.
    subscribers: SubscriberSet,
}

impl ContextCell {
    pub(crate) fn new(variety: Variety) -> Self {
        Self {
            inner: Arc::new(ContextCellInner {
                variety,
                current: RwLock::new(None),
                subscribers: SubscriberSet::new(),
            }),
        }
    }

    /// The variety this cell is waiting for.
    pub fn variety(&self) -> Variety {
        self.inner.variety
    }

    /// The provider's snapshot as of the last sync, or `None` while
    /// undiscovered.
    pub fn value(&self) -> Option<Arc<Snapshot>> {
        self.inner
            .current
            .read()
            .expect("context value lock poisoned")
            .clone()
    }

    /// Seed the cell from a discovered provider and keep it in sync.
    ///
    /// Returns the standing subscription on the provider, which the owning
    /// manager records per connecting node so teardown can release it.
    pub(crate) fn sync_from(&self, view: &ContextView) -> Subscription {
        {
            let mut current = self
                .inner
                .current
                .write()
                .expect("context value lock poisoned");
            *current = Some(view.value());
        }
        self.inner.subscribers.notify_all();

        let weak = Arc::downgrade(&self.inner);
        let provider = view.clone();
        view.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                {
                    let mut current =
                        inner.current.write().expect("context value lock poisoned");
                    *current = Some(provider.value());
                }
                inner.subscribers.notify_all();
            }
        })
    }

    /// Register a callback invoked on every provider sync.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }
}

impl Clone for ContextCell {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ReadSignal for ContextCell {
    fn read(&self) -> Value {
        Value::new(self.value())
    }

    fn subscribe_boxed(&self, callback: Box<dyn Fn() + Send + Sync>) -> Subscription {
        self.inner.subscribers.subscribe(callback)
    }
}

impl std::fmt::Debug for ContextCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCell")
            .field("variety", &self.inner.variety)
            .field("discovered", &self.value().is_some())
            .finish()
    }
}
