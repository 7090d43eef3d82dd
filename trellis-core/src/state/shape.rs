//! State Shapes and Factory Tools
//!
//! A state factory builds cells, derivations, and updaters through
//! [`StateTools`] and returns a [`StateShape`]: an explicit, ordered list
//! of named fields, each tagged as signal, updater, or context. Tagging at
//! construction removes any runtime shape-sniffing; a higher-order updater
//! is still unambiguously an updater.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::{ContextCell, Variety};
use crate::reactive::{Cell, DepValues, Derivation, FieldPatch, ReadSignal, Updater, Value};

/// A named member of a state shape.
pub enum StateField {
    /// A readable, subscribable member (cell, derivation, or anything else
    /// implementing [`ReadSignal`]). Resolved to its value in snapshots.
    Signal(Arc<dyn ReadSignal>),

    /// A transactional writer. Exposed as-is in snapshots.
    Updater(Updater),

    /// A context placeholder from the factory's context hook. Exposed as
    /// the raw handle in snapshots, not further unwrapped.
    Context(ContextCell),
}

/// The ordered field mapping returned by a state factory.
#[derive(Default)]
pub struct StateShape {
    fields: IndexMap<String, StateField>,
}

impl StateShape {
    /// Start an empty shape.
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Expose a cell under `name`.
    pub fn cell(self, name: impl Into<String>, cell: &Cell) -> Self {
        self.signal(name, cell.as_signal())
    }

    /// Expose a derivation under `name`.
    pub fn derivation(self, name: impl Into<String>, derivation: &Derivation) -> Self {
        self.signal(name, derivation.as_signal())
    }

    /// Expose an arbitrary signal under `name`.
    pub fn signal(mut self, name: impl Into<String>, signal: Arc<dyn ReadSignal>) -> Self {
        self.fields.insert(name.into(), StateField::Signal(signal));
        self
    }

    /// Expose an updater under `name`.
    pub fn updater(mut self, name: impl Into<String>, updater: &Updater) -> Self {
        self.fields
            .insert(name.into(), StateField::Updater(updater.clone()));
        self
    }

    /// Expose a context placeholder under `name`.
    pub fn context(mut self, name: impl Into<String>, cell: &ContextCell) -> Self {
        self.fields
            .insert(name.into(), StateField::Context(cell.clone()));
        self
    }

    pub(crate) fn into_fields(self) -> IndexMap<String, StateField> {
        self.fields
    }
}

/// Constructors handed to a state factory.
///
/// Only valid for the duration of the factory call; in particular,
/// [`from_context`](Self::from_context) declarations are collected here and
/// resolved when the finished manager connects to a host node.
pub struct StateTools {
    pending_contexts: RefCell<Vec<ContextCell>>,
}

impl StateTools {
    pub(crate) fn new() -> Self {
        Self {
            pending_contexts: RefCell::new(Vec::new()),
        }
    }

    /// Create a mutable cell holding `initial`.
    pub fn atom<T: Send + Sync + 'static>(&self, initial: T) -> Cell {
        Cell::new(Value::new(initial))
    }

    /// Create a memoized derivation over named inputs.
    pub fn computed<I, N, F>(&self, inputs: I, combine: F) -> Derivation
    where
        I: IntoIterator<Item = (N, Arc<dyn ReadSignal>)>,
        N: Into<String>,
        F: Fn(&DepValues) -> Value + Send + Sync + 'static,
    {
        Derivation::new(inputs, combine)
    }

    /// Create a transactional updater over named target cells.
    pub fn update<I, N, F>(&self, targets: I, reducer: F) -> Updater
    where
        I: IntoIterator<Item = (N, Cell)>,
        N: Into<String>,
        F: Fn(&DepValues, &[Value]) -> FieldPatch + Send + Sync + 'static,
    {
        Updater::new(targets, reducer)
    }

    /// Declare that this state wants the nearest ancestor-provided state of
    /// `variety`.
    ///
    /// Returns a placeholder immediately; discovery is deferred until the
    /// manager connects to a host node.
    pub fn from_context(&self, variety: Variety) -> ContextCell {
        let cell = ContextCell::new(variety);
        self.pending_contexts.borrow_mut().push(cell.clone());
        cell
    }

    pub(crate) fn take_pending_contexts(&self) -> Vec<ContextCell> {
        self.pending_contexts.take()
    }
}
