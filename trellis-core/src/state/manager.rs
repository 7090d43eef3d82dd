//! State Manager (Aggregate Signal)
//!
//! The composite reactive object: it wraps the cells, derivations, and
//! updaters a factory produced into one versioned, immutable, externally
//! observable snapshot with batched change notification, and carries the
//! provider/consumer ends of the context protocol.
//!
//! # How the Aggregate Works
//!
//! 1. `define_state` mints a process-unique [`Variety`] and captures the
//!    factory. Each `create` call runs the factory once and subscribes a
//!    schedule-notify handler to every non-updater member.
//!
//! 2. `value()` is stale-computed: an internal staleness flag gates
//!    rebuilding the frozen snapshot exactly like a derivation, but it
//!    becomes stale only through the member subscriptions, never on access.
//!    Two reads with no intervening change return the identical `Arc`.
//!
//! 3. Batching: the first member notification in a window schedules one
//!    deferred flush; further notifications before the flush only re-mark
//!    staleness. The flush clears the scheduled flag and notifies external
//!    subscribers exactly once, however many members changed.
//!
//! # Context
//!
//! Connecting to a host node resolves the factory's pending context hooks
//! by dispatching discovery requests from that node, and records every
//! standing provider subscription per node so disconnecting one node
//! releases exactly that node's subscriptions. Disconnection is terminal
//! for the (manager, node) pair; a fresh instance is needed to reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use super::shape::{StateField, StateShape, StateTools};
use super::snapshot::Snapshot;
use crate::context::{ContextCell, ContextView, Variety};
use crate::error::{Result, StateError};
use crate::host::{HostAdapter, NodeId};
use crate::reactive::{scheduler, ReadSignal, SubscriberSet, Subscription};

/// A reusable state definition: factory plus variety token.
///
/// Produced by [`define_state`]; each [`create`](Self::create) call yields
/// an independent [`StateManager`] of the same variety.
pub struct StateDef<Args> {
    variety: Variety,
    factory: Arc<dyn Fn(&StateTools, Args) -> StateShape + Send + Sync>,
}

impl<Args> Clone for StateDef<Args> {
    fn clone(&self) -> Self {
        Self {
            variety: self.variety,
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<Args: 'static> StateDef<Args> {
    /// The opaque identity of this definition, used as the context
    /// discovery key.
    pub fn variety(&self) -> Variety {
        self.variety
    }

    /// Run the factory and wrap its shape in a new manager.
    pub fn create(&self, args: Args) -> StateManager {
        let tools = StateTools::new();
        let shape = (self.factory)(&tools, args);
        StateManager::new(self.variety, shape, tools.take_pending_contexts())
    }
}

/// Declare a new state variety.
///
/// The sole entry point for application code: the factory receives the
/// constructor tools (atom / computed / update / context hook) and returns
/// the shape of one state instance.
///
/// # Example
///
/// ```rust,ignore
/// let counter = define_state(|tools, initial: i32| {
///     let count = tools.atom(initial);
///     let double = tools.computed([("count", count.as_signal())], |deps| {
///         Value::new(deps.get::<i32>("count").copied().unwrap_or(0) * 2)
///     });
///     let increment = tools.update([("count", count.clone())], |values, _| {
///         let current = values.get::<i32>("count").copied().unwrap_or(0);
///         FieldPatch::new().set("count", Value::new(current + 1))
///     });
///     StateShape::new()
///         .cell("count", &count)
///         .derivation("double", &double)
///         .updater("increment", &increment)
/// });
/// let instance = counter.create(5);
/// ```
pub fn define_state<Args, F>(factory: F) -> StateDef<Args>
where
    Args: 'static,
    F: Fn(&StateTools, Args) -> StateShape + Send + Sync + 'static,
{
    StateDef {
        variety: Variety::fresh(),
        factory: Arc::new(factory),
    }
}

/// Per-node connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Connected,
    /// Terminal; reconnecting requires a new manager instance.
    Disconnected,
}

struct Connection {
    state: NodeState,
    adapter: Arc<dyn HostAdapter>,
    /// Standing subscriptions on providers discovered through this node.
    context_subs: Vec<Subscription>,
    /// Whether this manager already registered itself as a provider here.
    provided: bool,
}

/// The aggregate signal over one factory-built state shape.
///
/// Cheaply clonable; clones share the same instance.
pub struct StateManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    variety: Variety,

    /// The factory's field mapping, in declaration order.
    fields: IndexMap<String, StateField>,

    /// Snapshot of the current staleness epoch (None before first read).
    snapshot: RwLock<Option<Arc<Snapshot>>>,

    /// Whether the snapshot must be rebuilt on next read. Initially true.
    is_stale: AtomicBool,

    /// Whether a deferred flush is already scheduled for this window.
    is_notify_scheduled: AtomicBool,

    /// External subscribers, notified once per flush.
    subscribers: SubscriberSet,

    /// Context placeholders declared through the factory's hook, resolved
    /// at connect time.
    context_cells: Vec<ContextCell>,

    /// Per-node connection bookkeeping.
    connections: RwLock<HashMap<NodeId, Connection>>,

    /// Subscriptions on the shape's own members, held for the manager's
    /// lifetime.
    member_subs: RwLock<Vec<Subscription>>,
}

impl ManagerInner {
    /// Mark stale and schedule at most one flush per window.
    fn schedule_notify(inner: &Arc<ManagerInner>) {
        inner.is_stale.store(true, Ordering::SeqCst);

        if !inner.is_notify_scheduled.swap(true, Ordering::SeqCst) {
            let weak = Arc::downgrade(inner);
            scheduler::defer(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.is_notify_scheduled.store(false, Ordering::SeqCst);
                    inner.subscribers.notify_all();
                }
            });
        }
    }
}

impl StateManager {
    fn new(variety: Variety, shape: StateShape, context_cells: Vec<ContextCell>) -> Self {
        let inner = Arc::new(ManagerInner {
            variety,
            fields: shape.into_fields(),
            snapshot: RwLock::new(None),
            is_stale: AtomicBool::new(true),
            is_notify_scheduled: AtomicBool::new(false),
            subscribers: SubscriberSet::new(),
            context_cells,
            connections: RwLock::new(HashMap::new()),
            member_subs: RwLock::new(Vec::new()),
        });

        // Every non-updater member feeds the aggregate's staleness and
        // batching.
        let mut subs = Vec::new();
        for field in inner.fields.values() {
            let weak = Arc::downgrade(&inner);
            let handler = Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    ManagerInner::schedule_notify(&inner);
                }
            });
            match field {
                StateField::Signal(signal) => subs.push(signal.subscribe_boxed(handler)),
                StateField::Context(cell) => subs.push(cell.subscribe_boxed(handler)),
                StateField::Updater(_) => {}
            }
        }
        *inner
            .member_subs
            .write()
            .expect("member subs lock poisoned") = subs;

        Self { inner }
    }

    /// The variety this manager provides when registered.
    pub fn variety(&self) -> Variety {
        self.inner.variety
    }

    /// The current frozen snapshot.
    ///
    /// Rebuilt only when a member changed since the last read; otherwise
    /// the identical `Arc` is returned (referential stability).
    pub fn value(&self) -> Arc<Snapshot> {
        if self.inner.is_stale.swap(false, Ordering::SeqCst) {
            let snapshot = Arc::new(Snapshot::build(&self.inner.fields, true));
            *self
                .inner
                .snapshot
                .write()
                .expect("snapshot lock poisoned") = Some(snapshot);
        }

        self.inner
            .snapshot
            .read()
            .expect("snapshot lock poisoned")
            .clone()
            .expect("fresh state manager has a snapshot")
    }

    pub(crate) fn read_only_snapshot(&self) -> Snapshot {
        Snapshot::build(&self.inner.fields, false)
    }

    /// Register a callback for batched change notifications.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }

    /// Number of live external subscriptions (including standing context
    /// consumers).
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Whether two handles refer to the same manager instance.
    pub fn same(&self, other: &StateManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attach this manager to a host node and resolve every context hook
    /// declared by the factory by dispatching discovery requests from that
    /// node.
    ///
    /// Connecting the same node twice is a no-op. A node that was
    /// disconnected is terminal: reconnecting it fails.
    pub fn connect_context(&self, adapter: Arc<dyn HostAdapter>) -> Result<()> {
        let node = adapter.node_id();

        {
            let connections = self
                .inner
                .connections
                .read()
                .expect("connections lock poisoned");
            if let Some(connection) = connections.get(&node) {
                return match connection.state {
                    NodeState::Connected => Ok(()),
                    NodeState::Disconnected => Err(StateError::NodeDisconnected { node }),
                };
            }
        }

        let discovered = Arc::new(Mutex::new(Vec::new()));
        for cell in &self.inner.context_cells {
            let cell = cell.clone();
            let discovered = Arc::clone(&discovered);
            adapter.consume_context(
                cell.variety(),
                Box::new(move |view| {
                    let sub = cell.sync_from(&view);
                    discovered
                        .lock()
                        .expect("context discovery lock poisoned")
                        .push(sub);
                }),
            );
        }
        let context_subs = std::mem::take(
            &mut *discovered
                .lock()
                .expect("context discovery lock poisoned"),
        );

        debug!(
            node = node.raw(),
            variety = self.inner.variety.raw(),
            resolved = context_subs.len(),
            "state manager connected to host node"
        );

        self.inner
            .connections
            .write()
            .expect("connections lock poisoned")
            .insert(
                node,
                Connection {
                    state: NodeState::Connected,
                    adapter,
                    context_subs,
                    provided: false,
                },
            );

        Ok(())
    }

    /// Register this manager as the provider of its own variety on every
    /// connected node.
    ///
    /// Each node receives one read-only [`ContextView`], constructed here.
    /// Fails with [`StateError::NotConnected`] before any connection.
    pub fn provide(&self) -> Result<()> {
        let mut connections = self
            .inner
            .connections
            .write()
            .expect("connections lock poisoned");

        let mut any_connected = false;
        for connection in connections.values_mut() {
            if connection.state != NodeState::Connected {
                continue;
            }
            any_connected = true;
            if !connection.provided {
                connection.provided = true;
                connection
                    .adapter
                    .provide_context(self.inner.variety, ContextView::new(self.clone()));
            }
        }

        if !any_connected {
            return Err(StateError::NotConnected {
                operation: "provide",
            });
        }
        Ok(())
    }

    /// Dispatch a single discovery request for this manager's own variety
    /// and return whatever provider answers, without wiring a standing
    /// subscription.
    ///
    /// Fails with [`StateError::NotConnected`] before any connection.
    pub fn inject(&self) -> Result<Option<ContextView>> {
        let adapter = {
            let connections = self
                .inner
                .connections
                .read()
                .expect("connections lock poisoned");
            connections
                .values()
                .find(|connection| connection.state == NodeState::Connected)
                .map(|connection| Arc::clone(&connection.adapter))
        };
        let adapter = adapter.ok_or(StateError::NotConnected {
            operation: "inject",
        })?;

        let answer = Arc::new(Mutex::new(None));
        let answer_slot = Arc::clone(&answer);
        adapter.consume_context(
            self.inner.variety,
            Box::new(move |view| {
                *answer_slot.lock().expect("inject answer lock poisoned") = Some(view);
            }),
        );

        let view = answer.lock().expect("inject answer lock poisoned").take();
        Ok(view)
    }

    /// Release every standing context subscription held through `node` and
    /// mark the node terminally disconnected.
    ///
    /// Other connected nodes are unaffected.
    pub fn disconnect_context(&self, node: NodeId) -> Result<()> {
        let released = {
            let mut connections = self
                .inner
                .connections
                .write()
                .expect("connections lock poisoned");
            let connection = connections
                .get_mut(&node)
                .ok_or(StateError::UnknownNode { node })?;

            connection.state = NodeState::Disconnected;
            std::mem::take(&mut connection.context_subs)
        };

        let count = released.len();
        for sub in released {
            sub.unsubscribe();
        }

        debug!(
            node = node.raw(),
            released = count,
            "state manager disconnected from host node"
        );
        Ok(())
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("variety", &self.inner.variety)
            .field("fields", &self.inner.fields.keys().collect::<Vec<_>>())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{FieldPatch, Value};
    use std::sync::atomic::AtomicI32;

    fn counter_def() -> StateDef<i32> {
        define_state(|tools, initial: i32| {
            let count = tools.atom(initial);
            let double = tools.computed([("count", count.as_signal())], |deps| {
                Value::new(deps.get::<i32>("count").copied().unwrap_or(0) * 2)
            });
            let increment = tools.update([("count", count.clone())], |values, _| {
                let current = values.get::<i32>("count").copied().unwrap_or(0);
                FieldPatch::new().set("count", Value::new(current + 1))
            });
            StateShape::new()
                .cell("count", &count)
                .derivation("double", &double)
                .updater("increment", &increment)
        })
    }

    #[test]
    fn initial_snapshot_resolves_fields() {
        let instance = counter_def().create(5);
        let snapshot = instance.value();

        assert_eq!(snapshot.get::<i32>("count"), Some(&5));
        assert_eq!(snapshot.get::<i32>("double"), Some(&10));
        assert!(snapshot.updater("increment").is_some());
    }

    #[test]
    fn updater_call_refreshes_snapshot() {
        let instance = counter_def().create(1);

        instance.value().updater("increment").unwrap().call(&[]);

        let snapshot = instance.value();
        assert_eq!(snapshot.get::<i32>("count"), Some(&2));
        assert_eq!(snapshot.get::<i32>("double"), Some(&4));
    }

    #[test]
    fn snapshot_identity_is_stable_between_changes() {
        let instance = counter_def().create(1);

        let first = instance.value();
        let second = instance.value();
        assert!(Arc::ptr_eq(&first, &second));

        first.updater("increment").unwrap().call(&[]);
        let third = instance.value();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn updater_reference_is_stable_across_epochs() {
        let instance = counter_def().create(1);

        let before = instance.value().updater("increment").unwrap().clone();
        before.call(&[]);
        let after = instance.value();

        assert!(before.same(after.updater("increment").unwrap()));
    }

    #[test]
    fn synchronous_updates_batch_into_one_notification() {
        let instance = counter_def().create(0);
        let notify_count = Arc::new(AtomicI32::new(0));
        let notify_clone = notify_count.clone();
        instance.subscribe(move || {
            notify_clone.fetch_add(1, Ordering::SeqCst);
        });

        let increment = instance.value().updater("increment").unwrap().clone();
        increment.call(&[]);
        increment.call(&[]);
        increment.call(&[]);

        assert_eq!(notify_count.load(Ordering::SeqCst), 0);
        scheduler::flush();
        assert_eq!(notify_count.load(Ordering::SeqCst), 1);

        assert_eq!(instance.value().get::<i32>("count"), Some(&3));
        assert_eq!(instance.value().get::<i32>("double"), Some(&6));
    }

    #[test]
    fn notifications_resume_after_each_flush() {
        let instance = counter_def().create(1);
        let notify_count = Arc::new(AtomicI32::new(0));
        let notify_clone = notify_count.clone();
        instance.subscribe(move || {
            notify_clone.fetch_add(1, Ordering::SeqCst);
        });

        let increment = instance.value().updater("increment").unwrap().clone();

        increment.call(&[]);
        scheduler::flush();
        assert_eq!(notify_count.load(Ordering::SeqCst), 1);

        increment.call(&[]);
        scheduler::flush();
        assert_eq!(notify_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_external_notifications() {
        let instance = counter_def().create(1);
        let notify_count = Arc::new(AtomicI32::new(0));
        let notify_clone = notify_count.clone();
        let sub = instance.subscribe(move || {
            notify_clone.fetch_add(1, Ordering::SeqCst);
        });

        let increment = instance.value().updater("increment").unwrap().clone();
        increment.call(&[]);
        scheduler::flush();
        assert_eq!(notify_count.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        increment.call(&[]);
        scheduler::flush();
        assert_eq!(notify_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn provide_before_connect_fails() {
        let instance = counter_def().create(0);
        assert_eq!(
            instance.provide(),
            Err(StateError::NotConnected {
                operation: "provide"
            })
        );
    }

    #[test]
    fn inject_before_connect_fails() {
        let instance = counter_def().create(0);
        assert_eq!(
            instance.inject().unwrap_err(),
            StateError::NotConnected {
                operation: "inject"
            }
        );
    }

    #[test]
    fn variety_is_shared_across_instances_of_one_def() {
        let def = counter_def();
        let a = def.create(0);
        let b = def.create(1);
        assert_eq!(a.variety(), b.variety());

        let other = counter_def();
        assert_ne!(def.variety(), other.variety());
    }
}
