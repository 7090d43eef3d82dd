//! Host Environment Adapter
//!
//! The seam between the reactive core and whatever owns the node tree. The
//! core never owns nodes; it consumes exactly three capabilities:
//!
//! - node identity, to key per-node subscription-cleanup bookkeeping,
//! - a way to register a context provider on a node,
//! - a way to dispatch a context request upward through ancestors.
//!
//! The core holds adapters behind `Arc<dyn HostAdapter>` purely for the
//! duration of a connection; node lifetime is controlled entirely by the
//! external component tree.

mod memory;

use std::sync::atomic::{AtomicU64, Ordering};

pub use memory::MemoryHost;

use crate::context::{ContextView, Variety};

/// Identity of a host node, sufficient for bookkeeping and comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot callback invoked by the nearest provider of a requested
/// variety. Never invoked if no provider answers.
pub type ContextCallback = Box<dyn FnOnce(ContextView)>;

/// Capabilities the core consumes from the host environment.
///
/// # Contract for implementors
///
/// - `provide_context` keeps at most one active provider per variety per
///   node: a second registration of the same variety is rejected, the first
///   registration wins, and a single diagnostic is emitted the first time
///   this happens on the node (not once per attempt).
/// - `consume_context` dispatches the request as if it bubbled from this
///   node upward; the requesting node itself participates in the search.
///   The nearest match stops propagation and calls `callback` exactly once,
///   synchronously.
pub trait HostAdapter: Send + Sync {
    /// True when running without client-side assumptions (no timers, no
    /// rendering turn). The core makes no scheduling decisions based on
    /// this; it is surfaced for host glue.
    fn is_server_side(&self) -> bool {
        false
    }

    /// Identity of the node this adapter speaks for.
    fn node_id(&self) -> NodeId;

    /// Register `view` as this node's provider for `variety`.
    fn provide_context(&self, variety: Variety, view: ContextView);

    /// Dispatch a discovery request for `variety` from this node upward.
    fn consume_context(&self, variety: Variety, callback: ContextCallback);
}
