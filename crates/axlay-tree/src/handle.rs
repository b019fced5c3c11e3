use std::{fmt, ops::Deref, sync::Arc};

use crate::{TreeProvider, UiNode, collect_matching};

/// Shared handle to a tree provider that hands out self-releasing node references.
#[derive(Clone)]
pub struct Tree {
    provider: Arc<dyn TreeProvider>,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("generation", &self.provider.generation())
            .finish()
    }
}

impl Tree {
    /// Wrap a provider.
    pub fn new(provider: Arc<dyn TreeProvider>) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn TreeProvider> {
        &self.provider
    }

    /// Current tree generation.
    pub fn generation(&self) -> u64 {
        self.provider.generation()
    }

    /// Root of the active window.
    pub fn root(&self) -> Option<NodeRef> {
        self.provider.active_root().map(|n| self.wrap(n))
    }

    /// Children of `node` in document order.
    pub fn children(&self, node: &UiNode) -> Vec<NodeRef> {
        self.wrap_all(self.provider.children(node))
    }

    /// Direct text lookup (case-insensitive substring) under `root`.
    pub fn find_by_text(&self, root: &UiNode, text: &str) -> Vec<NodeRef> {
        self.wrap_all(self.provider.find_by_text(root, text))
    }

    /// Direct resource-id lookup (exact) under `root`.
    pub fn find_by_resource_id(&self, root: &UiNode, id: &str) -> Vec<NodeRef> {
        self.wrap_all(self.provider.find_by_resource_id(root, id))
    }

    /// Full depth-first traversal under `root` (inclusive), keeping nodes matching `pred`.
    pub fn collect(&self, root: &UiNode, pred: &dyn Fn(&UiNode) -> bool) -> Vec<NodeRef> {
        self.wrap_all(collect_matching(self.provider.as_ref(), root, pred))
    }

    /// Acquire another reference to `node`.
    pub fn obtain(&self, node: &UiNode) -> NodeRef {
        self.wrap(self.provider.obtain(node))
    }

    fn wrap(&self, node: UiNode) -> NodeRef {
        NodeRef {
            node,
            provider: self.provider.clone(),
        }
    }

    fn wrap_all(&self, nodes: Vec<UiNode>) -> Vec<NodeRef> {
        nodes.into_iter().map(|n| self.wrap(n)).collect()
    }
}

/// An acquired node reference. Released back to its provider when dropped.
pub struct NodeRef {
    node: UiNode,
    provider: Arc<dyn TreeProvider>,
}

impl NodeRef {
    /// True when the provider has moved on to a newer tree generation.
    pub fn is_stale(&self) -> bool {
        self.node.generation() != self.provider.generation()
    }

    /// Borrow the underlying node.
    pub fn node(&self) -> &UiNode {
        &self.node
    }
}

impl Deref for NodeRef {
    type Target = UiNode;

    fn deref(&self) -> &UiNode {
        &self.node
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.node).finish()
    }
}

impl Drop for NodeRef {
    fn drop(&mut self) {
        self.provider.release(&self.node);
    }
}
