//! In-Memory Host Tree
//!
//! A minimal parent-linked node tree implementing [`HostAdapter`]. It
//! stands in for a real component tree in tests, benchmarks, and demos:
//! nodes are plain IDs, context requests walk the parent chain, and the
//! duplicate-provider policy is enforced exactly as the adapter contract
//! requires.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tracing::warn;

use super::{ContextCallback, HostAdapter, NodeId};
use crate::context::{ContextView, Variety};

/// A shared in-memory node tree.
///
/// Cloning the host is cheap; clones operate on the same tree.
#[derive(Clone)]
pub struct MemoryHost {
    tree: Arc<Tree>,
}

struct Tree {
    nodes: RwLock<HashMap<NodeId, NodeEntry>>,
}

struct NodeEntry {
    parent: Option<NodeId>,
    providers: IndexMap<Variety, ContextView>,
    duplicate_warned: bool,
    duplicate_rejections: u32,
}

impl MemoryHost {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Tree {
                nodes: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Add a node beneath `parent` (or a root when `None`).
    pub fn create_node(&self, parent: Option<NodeId>) -> NodeId {
        let id = NodeId::new();
        self.tree
            .nodes
            .write()
            .expect("host tree lock poisoned")
            .insert(
                id,
                NodeEntry {
                    parent,
                    providers: IndexMap::new(),
                    duplicate_warned: false,
                    duplicate_rejections: 0,
                },
            );
        id
    }

    /// An adapter speaking for `node`.
    pub fn adapter(&self, node: NodeId) -> Arc<dyn HostAdapter> {
        Arc::new(MemoryAdapter {
            tree: Arc::clone(&self.tree),
            node,
            server_side: false,
        })
    }

    /// An adapter speaking for `node` with the server-side flag set.
    pub fn server_adapter(&self, node: NodeId) -> Arc<dyn HostAdapter> {
        Arc::new(MemoryAdapter {
            tree: Arc::clone(&self.tree),
            node,
            server_side: true,
        })
    }

    /// Number of active provider registrations on `node`.
    pub fn provider_count(&self, node: NodeId) -> usize {
        self.tree
            .nodes
            .read()
            .expect("host tree lock poisoned")
            .get(&node)
            .map(|entry| entry.providers.len())
            .unwrap_or(0)
    }

    /// How many duplicate provider registrations `node` has rejected.
    pub fn duplicate_rejections(&self, node: NodeId) -> u32 {
        self.tree
            .nodes
            .read()
            .expect("host tree lock poisoned")
            .get(&node)
            .map(|entry| entry.duplicate_rejections)
            .unwrap_or(0)
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryAdapter {
    tree: Arc<Tree>,
    node: NodeId,
    server_side: bool,
}

impl HostAdapter for MemoryAdapter {
    fn is_server_side(&self) -> bool {
        self.server_side
    }

    fn node_id(&self) -> NodeId {
        self.node
    }

    fn provide_context(&self, variety: Variety, view: ContextView) {
        let mut nodes = self.tree.nodes.write().expect("host tree lock poisoned");
        let Some(entry) = nodes.get_mut(&self.node) else {
            return;
        };

        if entry.providers.contains_key(&variety) {
            entry.duplicate_rejections += 1;
            if !entry.duplicate_warned {
                entry.duplicate_warned = true;
                warn!(
                    node = self.node.raw(),
                    variety = variety.raw(),
                    "duplicate context provider rejected; first registration wins"
                );
            }
            return;
        }

        entry.providers.insert(variety, view);
    }

    fn consume_context(&self, variety: Variety, callback: ContextCallback) {
        // Walk from the requesting node upward; nearest match stops the
        // propagation. Resolve the view before releasing the lock so the
        // callback may re-enter the tree.
        let view = {
            let nodes = self.tree.nodes.read().expect("host tree lock poisoned");
            let mut cursor = Some(self.node);
            let mut found = None;
            while let Some(node) = cursor {
                let Some(entry) = nodes.get(&node) else {
                    break;
                };
                if let Some(view) = entry.providers.get(&variety) {
                    found = Some(view.clone());
                    break;
                }
                cursor = entry.parent;
            }
            found
        };

        if let Some(view) = view {
            callback(view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{define_state, StateShape};

    fn empty_provider() -> crate::state::StateManager {
        let def = define_state(|_tools, ()| StateShape::new());
        def.create(())
    }

    #[test]
    fn nearest_provider_wins() {
        let host = MemoryHost::new();
        let grandparent = host.create_node(None);
        let parent = host.create_node(Some(grandparent));
        let child = host.create_node(Some(parent));

        let variety = Variety::fresh();
        let far = empty_provider();
        let near = empty_provider();

        host.adapter(grandparent)
            .provide_context(variety, ContextView::new(far));
        let near_view = ContextView::new(near);
        host.adapter(parent)
            .provide_context(variety, near_view.clone());

        let answered = Arc::new(RwLock::new(None));
        let answered_clone = answered.clone();
        host.adapter(child).consume_context(
            variety,
            Box::new(move |view| {
                *answered_clone.write().unwrap() = Some(view);
            }),
        );

        let answered = answered.read().unwrap();
        assert!(answered.as_ref().unwrap().same_provider(&near_view));
    }

    #[test]
    fn unanswered_request_never_invokes_callback() {
        let host = MemoryHost::new();
        let lonely = host.create_node(None);

        let called = Arc::new(RwLock::new(false));
        let called_clone = called.clone();
        host.adapter(lonely).consume_context(
            Variety::fresh(),
            Box::new(move |_| {
                *called_clone.write().unwrap() = true;
            }),
        );

        assert!(!*called.read().unwrap());
    }

    #[test]
    fn duplicate_provider_is_rejected_and_counted() {
        let host = MemoryHost::new();
        let node = host.create_node(None);
        let variety = Variety::fresh();

        let first_view = ContextView::new(empty_provider());
        host.adapter(node)
            .provide_context(variety, first_view.clone());
        host.adapter(node)
            .provide_context(variety, ContextView::new(empty_provider()));
        host.adapter(node)
            .provide_context(variety, ContextView::new(empty_provider()));

        assert_eq!(host.provider_count(node), 1);
        assert_eq!(host.duplicate_rejections(node), 2);

        // Discovery still resolves to the first registration.
        let answered = Arc::new(RwLock::new(None));
        let answered_clone = answered.clone();
        host.adapter(node).consume_context(
            variety,
            Box::new(move |view| {
                *answered_clone.write().unwrap() = Some(view);
            }),
        );
        let answered = answered.read().unwrap();
        assert!(answered.as_ref().unwrap().same_provider(&first_view));
    }

    #[test]
    fn server_adapter_sets_flag() {
        let host = MemoryHost::new();
        let node = host.create_node(None);
        assert!(!host.adapter(node).is_server_side());
        assert!(host.server_adapter(node).is_server_side());
    }
}
