//! Reactive Primitives
//!
//! This module implements the leaf units of the state engine: cells,
//! derivations, and updaters, plus the deferred flush queue that state
//! managers use for batching.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell holds one mutable value. Writes go through updaters only; every
//! write notifies every subscriber, with no equality check anywhere in the
//! propagation path.
//!
//! ## Derivations
//!
//! A Derivation combines a fixed, named set of input signals through a pure
//! function. It is lazy and memoized: invalidation is pushed (an input
//! change marks it stale and notifies downstream), recomputation is pulled
//! (deferred until the next read).
//!
//! ## Updaters
//!
//! An Updater is a transactional writer: it reads all of its bound cells,
//! runs a pure reducer, and writes back only the fields the reducer
//! returned.
//!
//! # Implementation Notes
//!
//! Dependencies are declared explicitly by name rather than discovered by
//! tracking reads, so the dependency graph of a state shape is fixed at
//! construction. Values are dynamically typed ([`Value`]) because one
//! aggregate holds fields of many types in a single map.

mod cell;
mod derivation;
mod subscriber;
mod updater;
mod value;

pub mod scheduler;

pub use cell::Cell;
pub use derivation::Derivation;
pub use subscriber::{SubscriberSet, Subscription, SubscriptionId};
pub use updater::{FieldPatch, Updater};
pub use value::{DepValues, Value};

/// Read-and-subscribe capability shared by every signal-like member of a
/// state shape (cells, derivations, context cells).
///
/// Object safe so that heterogeneous members fit one map.
pub trait ReadSignal: Send + Sync {
    /// Current value. Derivations recompute here if stale.
    fn read(&self) -> Value;

    /// Register a notification callback; returns the removal handle.
    fn subscribe_boxed(&self, callback: Box<dyn Fn() + Send + Sync>) -> Subscription;
}
