//! Transactional Updater
//!
//! An Updater is the only write path into cells. It binds a fixed set of
//! target cells to a pure reducer.
//!
//! # How Updaters Work
//!
//! 1. Calling the updater reads every bound cell's current value into a
//!    name-keyed map before the reducer runs. In this single-threaded model
//!    no external mutation interleaves with that read pass.
//!
//! 2. The reducer returns a partial patch `{name: new value}`. Only cells
//!    named in the patch are written; cells omitted are left untouched even
//!    though they were read.
//!
//! 3. Each written cell fires its own notification individually, in patch
//!    insertion order. There is no combined notification.
//!
//! A reducer that returns a key outside the declared target set is a
//! programmer error and fails fast with a panic rather than being silently
//! ignored.

use std::sync::Arc;

use indexmap::IndexMap;

use super::cell::Cell;
use super::value::{DepValues, Value};

/// A partial map of new values returned by a reducer.
///
/// Entries are applied in insertion order.
#[derive(Debug, Default)]
pub struct FieldPatch {
    entries: IndexMap<String, Value>,
}

impl FieldPatch {
    /// Create an empty patch (writes nothing).
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Add a new value for a declared target cell. Builder style.
    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.insert(name.into(), value);
        self
    }
}

type Reducer = dyn Fn(&DepValues, &[Value]) -> FieldPatch + Send + Sync;

/// A transactional writer bound to a fixed set of target cells.
///
/// Cheaply clonable; all clones share the same identity, which is what
/// keeps the updater field of a snapshot referentially stable across
/// staleness epochs.
pub struct Updater {
    inner: Arc<UpdaterInner>,
}

struct UpdaterInner {
    /// The cells this updater may write, in declaration order.
    targets: IndexMap<String, Cell>,

    /// The pure reducing function.
    reducer: Box<Reducer>,
}

impl Updater {
    /// Bind `targets` to `reducer`.
    pub fn new<I, N, F>(targets: I, reducer: F) -> Self
    where
        I: IntoIterator<Item = (N, Cell)>,
        N: Into<String>,
        F: Fn(&DepValues, &[Value]) -> FieldPatch + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(UpdaterInner {
                targets: targets
                    .into_iter()
                    .map(|(name, cell)| (name.into(), cell))
                    .collect(),
                reducer: Box::new(reducer),
            }),
        }
    }

    /// Run the reducer and apply its patch.
    ///
    /// # Panics
    ///
    /// Panics if the reducer returns a key that was not declared as a
    /// target.
    pub fn call(&self, args: &[Value]) {
        let mut current = DepValues::new();
        for (name, cell) in &self.inner.targets {
            current.insert(name.clone(), cell.read());
        }

        let patch = (self.inner.reducer)(&current, args);

        for (name, new_value) in patch.entries {
            let cell = self.inner.targets.get(&name).unwrap_or_else(|| {
                panic!("updater reducer returned undeclared target `{name}`")
            });
            cell.write(new_value);
        }
    }

    /// Whether two handles refer to the same updater.
    pub fn same(&self, other: &Updater) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Clone for Updater {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("targets", &self.inner.targets.keys().collect::<Vec<_>>())
            .finish()
    }
}
