//! Trellis Core
//!
//! This crate provides the reactive state engine for the Trellis UI
//! framework. It implements:
//!
//! - Reactive primitives (cells, derivations, transactional updaters)
//! - Aggregate state managers with frozen snapshots and batched
//!   notification
//! - A hierarchical context protocol for locating ancestor-owned state
//! - The host adapter seam toward the component tree
//!
//! Rendering, the component model, and tooling live outside this crate;
//! the core only produces immutable snapshots and change notifications.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: cells, derivations, updaters, and the deferred flush queue
//! - `state`: state shapes, snapshots, and the aggregate manager
//! - `context`: variety tokens, read-only views, consumer placeholders
//! - `host`: the adapter trait plus an in-memory node tree for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::reactive::{FieldPatch, Value};
//! use trellis_core::state::{define_state, StateShape};
//!
//! let counter = define_state(|tools, initial: i32| {
//!     let count = tools.atom(initial);
//!     let double = tools.computed([("count", count.as_signal())], |deps| {
//!         Value::new(deps.get::<i32>("count").copied().unwrap_or(0) * 2)
//!     });
//!     let increment = tools.update([("count", count.clone())], |values, _| {
//!         let current = values.get::<i32>("count").copied().unwrap_or(0);
//!         FieldPatch::new().set("count", Value::new(current + 1))
//!     });
//!     StateShape::new()
//!         .cell("count", &count)
//!         .derivation("double", &double)
//!         .updater("increment", &increment)
//! });
//!
//! let instance = counter.create(5);
//! assert_eq!(instance.value().get::<i32>("count"), Some(&5));
//! assert_eq!(instance.value().get::<i32>("double"), Some(&10));
//! ```

pub mod context;
pub mod error;
pub mod host;
pub mod reactive;
pub mod state;

pub use context::{ContextCell, ContextView, Variety};
pub use error::{Result, StateError};
pub use host::{HostAdapter, MemoryHost, NodeId};
pub use reactive::{Cell, DepValues, Derivation, FieldPatch, Updater, Value};
pub use state::{define_state, Snapshot, StateDef, StateManager, StateShape, StateTools};
