//! Cell Implementation
//!
//! A Cell is the fundamental mutable reactive unit. It holds one value and
//! a set of subscriber callbacks.
//!
//! # How Cells Work
//!
//! 1. A cell is created inside a state factory and owned, through the
//!    factory closure, by exactly one state manager.
//!
//! 2. The value changes only through the crate-internal `write`, which is
//!    reachable solely via an [`Updater`](super::Updater). External readers
//!    of a snapshot never obtain write access.
//!
//! 3. Every write notifies every subscriber, unconditionally. There is no
//!    equality check anywhere in the propagation path; callers that need
//!    idempotence must provide it themselves.
//!
//! # Lifecycle
//!
//! A cell lives exactly as long as the state manager whose factory created
//! it. Nothing outside that manager's closure retains it strongly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::subscriber::{SubscriberSet, Subscription};
use super::value::Value;
use super::ReadSignal;

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique cell ID.
fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A mutable reactive unit holding a single [`Value`].
///
/// # Example
///
/// ```rust,ignore
/// let count = Cell::new(Value::new(0_i32));
/// assert_eq!(count.read().downcast_ref::<i32>(), Some(&0));
/// ```
pub struct Cell {
    inner: Arc<CellInner>,
}

struct CellInner {
    /// Unique identifier for this cell.
    id: u64,

    /// The current value.
    value: RwLock<Value>,

    /// Callbacks notified on every write.
    subscribers: SubscriberSet,
}

impl Cell {
    /// Create a new cell holding `initial`.
    pub fn new(initial: Value) -> Self {
        Self {
            inner: Arc::new(CellInner {
                id: next_cell_id(),
                value: RwLock::new(initial),
                subscribers: SubscriberSet::new(),
            }),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value. No side effects, no recomputation.
    pub fn read(&self) -> Value {
        self.inner
            .value
            .read()
            .expect("value lock poisoned")
            .clone()
    }

    /// Replace the value, then notify every subscriber synchronously in
    /// subscription order.
    ///
    /// Writes never compare old and new values; every write notifies. A
    /// subscriber that panics propagates to the caller and aborts the rest
    /// of the notification pass.
    pub(crate) fn write(&self, new_value: Value) {
        {
            let mut guard = self.inner.value.write().expect("value lock poisoned");
            *guard = new_value;
        }
        self.inner.subscribers.notify_all();
    }

    /// Register a callback invoked on every write.
    ///
    /// Subscribing twice yields two live entries needing two unsubscribes.
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

    /// This cell as a dynamic signal, for use as a derivation input or a
    /// state-shape member.
    pub fn as_signal(&self) -> Arc<dyn ReadSignal> {
        Arc::new(self.clone())
    }
}

impl Clone for Cell {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ReadSignal for Cell {
    fn read(&self) -> Value {
        Cell::read(self)
    }

    fn subscribe_boxed(&self, callback: Box<dyn Fn() + Send + Sync>) -> Subscription {
        self.inner.subscribers.subscribe(callback)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
