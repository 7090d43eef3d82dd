//! State Managers
//!
//! This module composes the reactive primitives into externally observable
//! state: factory-built shapes, frozen snapshots, and the aggregate signal
//! that batches change notification and speaks the context protocol.

mod manager;
mod shape;
mod snapshot;

pub use manager::{define_state, StateDef, StateManager};
pub use shape::{StateField, StateShape, StateTools};
pub use snapshot::{Snapshot, SnapshotField};
