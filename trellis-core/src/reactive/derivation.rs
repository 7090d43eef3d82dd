//! Derivation Implementation
//!
//! A Derivation is a lazily recomputed, memoized value combined from a
//! fixed set of named input signals (cells or other derivations).
//!
//! # How Derivations Work
//!
//! 1. At construction, an invalidation handler is subscribed to every
//!    input. The derivation starts stale, so no work happens until the
//!    first read.
//!
//! 2. Reading a stale derivation gathers every input's current value into
//!    a name-keyed map, runs the combining function, caches the result,
//!    and clears staleness. Reading a fresh derivation returns the cache.
//!
//! 3. Any input notification marks the derivation stale and immediately
//!    notifies the derivation's own subscribers. Propagation is
//!    mark-dirty-then-propagate: recomputation is deferred to the next
//!    read (pull-based memoization over push-based invalidation).
//!
//! There is no equality suppression: an input that notifies always makes
//! this derivation notify, even if the recomputed value would be equal.
//!
//! # Cycles
//!
//! Cycles are neither detected nor prevented. A derivation whose inputs
//! transitively depend on itself recurses until the stack is exhausted;
//! avoiding that is a caller responsibility.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use super::subscriber::{SubscriberSet, Subscription};
use super::value::{DepValues, Value};
use super::ReadSignal;

/// Counter for generating unique derivation IDs.
static DERIVATION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique derivation ID.
fn next_derivation_id() -> u64 {
    DERIVATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A memoized value combined from named input signals.
///
/// # Example
///
/// ```rust,ignore
/// let double = Derivation::new(
///     [("count", count.as_signal())],
///     |deps| Value::new(deps.get::<i32>("count").copied().unwrap_or(0) * 2),
/// );
/// ```
pub struct Derivation {
    inner: Arc<DerivationInner>,
}

struct DerivationInner {
    /// Unique identifier for this derivation.
    id: u64,

    /// Named input signals, in declaration order.
    inputs: IndexMap<String, Arc<dyn ReadSignal>>,

    /// The pure combining function.
    combine: Box<dyn Fn(&DepValues) -> Value + Send + Sync>,

    /// The memoized result (None until first computed).
    cached: RwLock<Option<Value>>,

    /// Whether the cache must be recomputed on the next read.
    /// Initially true.
    is_stale: AtomicBool,

    /// Callbacks notified when any input invalidates this derivation.
    subscribers: SubscriberSet,

    /// Standing subscriptions on the inputs, held for the derivation's
    /// whole lifetime.
    input_subs: RwLock<Vec<Subscription>>,
}

impl Derivation {
    /// Create a derivation over `inputs`, combined by `combine`.
    ///
    /// Subscribes the invalidation handler to every input immediately; the
    /// combining function is not called until the first [`read`](Self::read).
    pub fn new<I, N, F>(inputs: I, combine: F) -> Self
    where
        I: IntoIterator<Item = (N, Arc<dyn ReadSignal>)>,
        N: Into<String>,
        F: Fn(&DepValues) -> Value + Send + Sync + 'static,
    {
        let inputs: IndexMap<String, Arc<dyn ReadSignal>> = inputs
            .into_iter()
            .map(|(name, signal)| (name.into(), signal))
            .collect();

        let inner = Arc::new(DerivationInner {
            id: next_derivation_id(),
            inputs,
            combine: Box::new(combine),
            cached: RwLock::new(None),
            is_stale: AtomicBool::new(true),
            subscribers: SubscriberSet::new(),
            input_subs: RwLock::new(Vec::new()),
        });

        let mut subs = Vec::with_capacity(inner.inputs.len());
        for signal in inner.inputs.values() {
            let weak = Arc::downgrade(&inner);
            subs.push(signal.subscribe_boxed(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.is_stale.store(true, Ordering::SeqCst);
                    inner.subscribers.notify_all();
                }
            })));
        }
        *inner.input_subs.write().expect("input subs lock poisoned") = subs;

        Self { inner }
    }

    /// Get the derivation's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value, recomputing only if stale.
    pub fn read(&self) -> Value {
        if self.inner.is_stale.swap(false, Ordering::SeqCst) {
            let mut deps = DepValues::new();
            for (name, signal) in &self.inner.inputs {
                deps.insert(name.clone(), signal.read());
            }

            let value = (self.inner.combine)(&deps);
            *self.inner.cached.write().expect("cache lock poisoned") = Some(value.clone());
            value
        } else {
            self.inner
                .cached
                .read()
                .expect("cache lock poisoned")
                .clone()
                .expect("fresh derivation has a cached value")
        }
    }

    /// Whether the next read will recompute.
    pub fn is_stale(&self) -> bool {
        self.inner.is_stale.load(Ordering::SeqCst)
    }

    /// Register a callback invoked whenever an input invalidates this
    /// derivation.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// This derivation as a dynamic signal, for use as an input to another
    /// derivation or as a state-shape member.
    pub fn as_signal(&self) -> Arc<dyn ReadSignal> {
        Arc::new(self.clone())
    }
}

impl Clone for Derivation {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ReadSignal for Derivation {
    fn read(&self) -> Value {
        Derivation::read(self)
    }

    fn subscribe_boxed(&self, callback: Box<dyn Fn() + Send + Sync>) -> Subscription {
        self.inner.subscribers.subscribe(callback)
    }
}

impl std::fmt::Debug for Derivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derivation")
            .field("id", &self.inner.id)
            .field("is_stale", &self.is_stale())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Cell;
    use std::sync::atomic::AtomicI32;

    fn double_of(cell: &Cell) -> Derivation {
        Derivation::new([("count", cell.as_signal())], |deps| {
            Value::new(deps.get::<i32>("count").copied().unwrap_or(0) * 2)
        })
    }

    #[test]
    fn combine_is_not_called_before_first_read() {
        let cell = Cell::new(Value::new(1_i32));
        let compute_count = Arc::new(AtomicI32::new(0));
        let compute_clone = compute_count.clone();

        let derivation = Derivation::new([("n", cell.as_signal())], move |deps| {
            compute_clone.fetch_add(1, Ordering::SeqCst);
            Value::new(deps.get::<i32>("n").copied().unwrap_or(0))
        });

        assert!(derivation.is_stale());
        assert_eq!(compute_count.load(Ordering::SeqCst), 0);

        derivation.read();
        assert_eq!(compute_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reads_are_memoized_until_an_input_changes() {
        let cell = Cell::new(Value::new(3_i32));
        let compute_count = Arc::new(AtomicI32::new(0));
        let compute_clone = compute_count.clone();

        let derivation = Derivation::new([("n", cell.as_signal())], move |deps| {
            compute_clone.fetch_add(1, Ordering::SeqCst);
            Value::new(deps.get::<i32>("n").copied().unwrap_or(0) * 2)
        });

        assert_eq!(derivation.read().downcast_ref::<i32>(), Some(&6));
        assert_eq!(derivation.read().downcast_ref::<i32>(), Some(&6));
        assert_eq!(compute_count.load(Ordering::SeqCst), 1);

        cell.write(Value::new(5_i32));
        assert_eq!(derivation.read().downcast_ref::<i32>(), Some(&10));
        assert_eq!(compute_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn input_change_marks_stale_and_notifies_without_recompute() {
        let cell = Cell::new(Value::new(1_i32));
        let compute_count = Arc::new(AtomicI32::new(0));
        let compute_clone = compute_count.clone();

        let derivation = Derivation::new([("n", cell.as_signal())], move |deps| {
            compute_clone.fetch_add(1, Ordering::SeqCst);
            Value::new(deps.get::<i32>("n").copied().unwrap_or(0))
        });

        let notify_count = Arc::new(AtomicI32::new(0));
        let notify_clone = notify_count.clone();
        derivation.subscribe(move || {
            notify_clone.fetch_add(1, Ordering::SeqCst);
        });

        cell.write(Value::new(2_i32));

        // Invalidation propagated, but nothing recomputed yet.
        assert_eq!(notify_count.load(Ordering::SeqCst), 1);
        assert_eq!(compute_count.load(Ordering::SeqCst), 0);
        assert!(derivation.is_stale());
    }

    #[test]
    fn derivation_of_derivation() {
        let cell = Cell::new(Value::new(5_i32));
        let doubled = double_of(&cell);
        let plus_ten = Derivation::new([("doubled", doubled.as_signal())], |deps| {
            Value::new(deps.get::<i32>("doubled").copied().unwrap_or(0) + 10)
        });

        assert_eq!(plus_ten.read().downcast_ref::<i32>(), Some(&20));

        cell.write(Value::new(10_i32));
        assert_eq!(plus_ten.read().downcast_ref::<i32>(), Some(&30));
    }

    #[test]
    fn equal_recomputed_value_still_notifies() {
        let cell = Cell::new(Value::new(1_i32));
        let constant = Derivation::new([("n", cell.as_signal())], |_| Value::new(0_i32));

        let notify_count = Arc::new(AtomicI32::new(0));
        let notify_clone = notify_count.clone();
        constant.subscribe(move || {
            notify_clone.fetch_add(1, Ordering::SeqCst);
        });

        constant.read();
        cell.write(Value::new(2_i32));
        cell.write(Value::new(3_i32));

        assert_eq!(notify_count.load(Ordering::SeqCst), 2);
    }
}
