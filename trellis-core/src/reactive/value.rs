//! Dynamically Typed Reactive Values
//!
//! State shapes are heterogeneous: one field may hold a number, the next a
//! string, the next a whole snapshot obtained through context. Cells and
//! derivations therefore traffic in a single dynamically typed payload
//! rather than a generic parameter, which is what lets an aggregate signal
//! keep all of its members in one name-keyed map.
//!
//! A `Value` is a cheaply clonable handle (`Arc` internally). Cloning a
//! value never copies the payload, and two clones of the same value compare
//! identical with [`Value::is_same`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// A dynamically typed, cheaply clonable reactive payload.
///
/// # Example
///
/// ```rust,ignore
/// let v = Value::new(5_i32);
/// assert_eq!(v.downcast_ref::<i32>(), Some(&5));
/// ```
#[derive(Clone)]
pub struct Value(Arc<dyn Any + Send + Sync>);

impl Value {
    /// Wrap an arbitrary payload.
    pub fn new<T: Send + Sync + 'static>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    /// Borrow the payload as a concrete type.
    ///
    /// Returns `None` if the payload is of a different type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Check whether two handles point at the same payload allocation.
    pub fn is_same(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The payload is type-erased; only its type id is observable.
        f.debug_tuple("Value")
            .field(&(*self.0).type_id())
            .finish()
    }
}

/// A name-keyed view of current input values, as handed to combining and
/// reducing functions.
///
/// Iteration order is insertion order, so reducers that walk the map see a
/// deterministic sequence.
#[derive(Debug, Clone, Default)]
pub struct DepValues {
    values: IndexMap<String, Value>,
}

impl DepValues {
    pub(crate) fn new() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Borrow a named input as a concrete type.
    ///
    /// Returns `None` if the name is absent or the payload has a different
    /// type.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values.get(name)?.downcast_ref::<T>()
    }

    /// Borrow a named input without downcasting.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Number of inputs in the map.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrips_payload() {
        let v = Value::new(42_i32);
        assert_eq!(v.downcast_ref::<i32>(), Some(&42));
        assert_eq!(v.downcast_ref::<String>(), None);
    }

    #[test]
    fn value_clones_share_payload() {
        let a = Value::new(String::from("apple"));
        let b = a.clone();
        assert!(a.is_same(&b));
        assert_eq!(b.downcast_ref::<String>().unwrap(), "apple");
    }

    #[test]
    fn distinct_values_are_not_same() {
        let a = Value::new(1_i32);
        let b = Value::new(1_i32);
        assert!(!a.is_same(&b));
    }

    #[test]
    fn dep_values_lookup() {
        let mut deps = DepValues::new();
        deps.insert("count", Value::new(5_i32));
        deps.insert("fruit", Value::new(String::from("pear")));

        assert_eq!(deps.get::<i32>("count"), Some(&5));
        assert_eq!(deps.get::<String>("fruit").unwrap(), "pear");
        assert_eq!(deps.get::<i32>("missing"), None);
        assert_eq!(deps.len(), 2);
    }
}
