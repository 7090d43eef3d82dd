//! Subscription bookkeeping shared by every reactive primitive.
//!
//! Cells, derivations, context cells, and state managers all keep a list of
//! notification callbacks. `SubscriberSet` centralizes that list so the
//! notification semantics are identical everywhere:
//!
//! - Callbacks run synchronously, in subscription order.
//! - Subscribing the same callback twice yields two independent entries;
//!   each needs its own unsubscribe.
//! - A panicking callback propagates to the notifier and aborts the rest of
//!   that notification pass. The core performs no isolation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Unique identifier for a single subscription entry.
///
/// Each call to `subscribe` mints a fresh ID, so repeated subscriptions by
/// the same callback identity remain distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

type Entries = RwLock<Vec<(SubscriptionId, Arc<dyn Fn() + Send + Sync>)>>;

/// An ordered set of notification callbacks.
pub struct SubscriberSet {
    entries: Arc<Entries>,
}

impl SubscriberSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a callback and return a handle that removes it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.entries
            .write()
            .expect("subscriber lock poisoned")
            .push((id, Arc::new(callback)));

        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Invoke every callback, in subscription order.
    ///
    /// The entry list is snapshotted before the first call, so callbacks
    /// that subscribe or unsubscribe mid-notification take effect on the
    /// next pass, and re-entrant notifications recurse on the call stack
    /// rather than deadlocking on the entry list.
    pub fn notify_all(&self) {
        let callbacks: Vec<Arc<dyn Fn() + Send + Sync>> = self
            .entries
            .read()
            .expect("subscriber lock poisoned")
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback();
        }
    }

    /// Number of live subscription entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("subscriber lock poisoned").len()
    }

    /// Whether the set has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriberSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one live subscription entry.
///
/// Removal is explicit: dropping the handle leaves the subscription live.
/// This matches the "subscribe returns an unsubscribe function" contract of
/// the external interface.
pub struct Subscription {
    id: SubscriptionId,
    entries: Weak<Entries>,
}

impl Subscription {
    /// Remove this entry from its set.
    ///
    /// A no-op if the owning reactive object has already been dropped.
    pub fn unsubscribe(self) {
        if let Some(entries) = self.entries.upgrade() {
            entries
                .write()
                .expect("subscriber lock poisoned")
                .retain(|(id, _)| *id != self.id);
        }
    }

    /// The unique ID of this entry.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn notify_calls_in_subscription_order() {
        let set = SubscriberSet::new();
        let order = Arc::new(RwLock::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            set.subscribe(move || order.write().unwrap().push(tag));
        }

        set.notify_all();
        assert_eq!(*order.read().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicate_subscriptions_are_independent() {
        let set = SubscriberSet::new();
        let count = Arc::new(AtomicI32::new(0));

        let count_a = count.clone();
        let sub_a = set.subscribe(move || {
            count_a.fetch_add(1, Ordering::SeqCst);
        });
        let count_b = count.clone();
        let _sub_b = set.subscribe(move || {
            count_b.fetch_add(1, Ordering::SeqCst);
        });

        set.notify_all();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // Removing one leaves the other live.
        sub_a.unsubscribe();
        set.notify_all();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn unsubscribe_after_owner_drop_is_noop() {
        let set = SubscriberSet::new();
        let sub = set.subscribe(|| {});
        drop(set);
        sub.unsubscribe();
    }

    #[test]
    fn subscribing_during_notify_takes_effect_next_pass() {
        let set = Arc::new(SubscriberSet::new());
        let count = Arc::new(AtomicI32::new(0));

        let set_inner = Arc::clone(&set);
        let count_inner = count.clone();
        set.subscribe(move || {
            let count_late = count_inner.clone();
            set_inner.subscribe(move || {
                count_late.fetch_add(1, Ordering::SeqCst);
            });
        });

        set.notify_all();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        set.notify_all();
        // One late subscriber from the first pass, plus the one added
        // during this pass does not run yet.
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
