//! Frozen Snapshots
//!
//! The externally visible face of a state manager: a plain, immutable
//! mapping from field name to resolved value. Signal members appear by
//! their current value, updater members as callables, context members as
//! their raw placeholder handle.
//!
//! Snapshots are immutable by construction; consumers detect "nothing
//! changed" by comparing `Arc` identity across reads.

use indexmap::IndexMap;

use super::shape::StateField;
use crate::context::ContextCell;
use crate::reactive::{Updater, Value};

/// A resolved field of a snapshot.
#[derive(Debug)]
pub enum SnapshotField {
    /// A signal member's value at build time.
    Value(Value),

    /// An updater member, unchanged across builds.
    Updater(Updater),

    /// A context placeholder handle, not further unwrapped.
    Context(ContextCell),
}

/// An immutable view of a state manager's fields at one staleness epoch.
#[derive(Debug, Default)]
pub struct Snapshot {
    fields: IndexMap<String, SnapshotField>,
}

impl Snapshot {
    /// Resolve `fields` into a snapshot. Updaters are skipped when
    /// `include_updaters` is false (read-only context views).
    pub(crate) fn build(
        fields: &IndexMap<String, StateField>,
        include_updaters: bool,
    ) -> Self {
        let mut resolved = IndexMap::with_capacity(fields.len());
        for (name, field) in fields {
            match field {
                StateField::Signal(signal) => {
                    resolved.insert(name.clone(), SnapshotField::Value(signal.read()));
                }
                StateField::Updater(updater) => {
                    if include_updaters {
                        resolved
                            .insert(name.clone(), SnapshotField::Updater(updater.clone()));
                    }
                }
                StateField::Context(cell) => {
                    resolved.insert(name.clone(), SnapshotField::Context(cell.clone()));
                }
            }
        }
        Self { fields: resolved }
    }

    /// Borrow a signal field's value as a concrete type.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        match self.fields.get(name)? {
            SnapshotField::Value(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Borrow a signal field's value without downcasting.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name)? {
            SnapshotField::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow an updater field.
    pub fn updater(&self, name: &str) -> Option<&Updater> {
        match self.fields.get(name)? {
            SnapshotField::Updater(updater) => Some(updater),
            _ => None,
        }
    }

    /// Borrow a context field's handle.
    pub fn context(&self, name: &str) -> Option<&ContextCell> {
        match self.fields.get(name)? {
            SnapshotField::Context(cell) => Some(cell),
            _ => None,
        }
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of resolved fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the snapshot has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
