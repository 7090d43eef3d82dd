//! Context Variety Tokens
//!
//! A variety classifies "which kind of state" a provider offers, so that a
//! consumer can ask for the nearest ancestor's state of that kind without
//! holding a reference to it.
//!
//! The token is a process-wide unique opaque identifier minted once per
//! [`define_state`](crate::state::define_state) call. Using an explicit
//! token instead of constructor identity keeps it `Copy` and hashable.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of a state definition, used as the context discovery key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variety(u64);

impl Variety {
    /// Mint a process-wide unique token.
    pub fn fresh() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw token value, for host-side diagnostics.
    pub fn raw(&self) -> u64 {
        self.0
    }
}
