//! The boundary to an externally owned, constantly mutating UI tree.
//!
//! A [`TreeProvider`] hands out [`UiNode`] references. Every reference it returns is
//! *acquired* and must be given back through [`TreeProvider::release`] exactly once.
//! [`Tree`] wraps a provider so callers work with [`NodeRef`]s that release themselves
//! when dropped, on every exit path.
//!
//! Nodes are time-scoped views. A node obtained before the foreground window changed
//! may describe a tree that no longer exists; [`NodeRef::is_stale`] reports this by
//! comparing generations, but nothing stops a caller from reading a stale node.
#![warn(missing_docs)]

use std::sync::Arc;

pub use axlay_protocol::{BoundingBox, NodeFlags};

mod error;
mod handle;
mod static_tree;

pub use error::{Error, Result};
pub use handle::{NodeRef, Tree};
pub use static_tree::{NodeSpec, StaticTree};

/// Provider-assigned node identity. Stable for the lifetime of one tree generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Attribute payload of a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeInfo {
    /// Provider-assigned identity.
    pub id: NodeId,
    /// Widget class.
    pub class_name: Option<String>,
    /// Visible text.
    pub text: Option<String>,
    /// Content description.
    pub content_description: Option<String>,
    /// Owning package.
    pub package_name: Option<String>,
    /// View resource id.
    pub resource_id: Option<String>,
    /// Screen bounds.
    pub bounds: BoundingBox,
    /// State flags.
    pub flags: NodeFlags,
}

/// Read-only reference to one node of the tree as it was when the reference was made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UiNode {
    /// Shared attribute payload.
    info: Arc<NodeInfo>,
    /// Tree generation the node belongs to.
    generation: u64,
}

impl UiNode {
    /// Wrap a payload for `generation`.
    pub fn new(info: Arc<NodeInfo>, generation: u64) -> Self {
        Self { info, generation }
    }

    /// Identity within its generation.
    pub fn id(&self) -> NodeId {
        self.info.id
    }

    /// Generation this node was read from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Full attribute payload.
    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    /// Widget class.
    pub fn class_name(&self) -> Option<&str> {
        self.info.class_name.as_deref()
    }

    /// Visible text.
    pub fn text(&self) -> Option<&str> {
        self.info.text.as_deref()
    }

    /// Content description.
    pub fn content_description(&self) -> Option<&str> {
        self.info.content_description.as_deref()
    }

    /// Owning package.
    pub fn package_name(&self) -> Option<&str> {
        self.info.package_name.as_deref()
    }

    /// View resource id.
    pub fn resource_id(&self) -> Option<&str> {
        self.info.resource_id.as_deref()
    }

    /// Screen bounds.
    pub fn bounds(&self) -> BoundingBox {
        self.info.bounds
    }

    /// State flags.
    pub fn flags(&self) -> NodeFlags {
        self.info.flags
    }

    /// Whether the node is visible to the user.
    pub fn is_visible(&self) -> bool {
        self.info.flags.visible
    }
}

/// Source of tree nodes.
///
/// Results may be stale or empty when the foreground window changes mid-call;
/// nothing is atomic across a traversal.
pub trait TreeProvider: Send + Sync {
    /// Root of the active window, if any.
    fn active_root(&self) -> Option<UiNode>;

    /// Children of `node` in document order. Stale nodes have no children.
    fn children(&self, node: &UiNode) -> Vec<UiNode>;

    /// Nodes under `root` (inclusive) whose text contains `text`, ignoring case,
    /// in document order.
    fn find_by_text(&self, root: &UiNode, text: &str) -> Vec<UiNode> {
        let needle = text.to_lowercase();
        collect_matching(self, root, &|n: &UiNode| {
            n.text().is_some_and(|t| t.to_lowercase().contains(&needle))
        })
    }

    /// Nodes under `root` (inclusive) whose resource id equals `id`, in document order.
    fn find_by_resource_id(&self, root: &UiNode, id: &str) -> Vec<UiNode> {
        collect_matching(self, root, &|n: &UiNode| n.resource_id() == Some(id))
    }

    /// Acquire an additional reference to `node`.
    fn obtain(&self, node: &UiNode) -> UiNode {
        node.clone()
    }

    /// Return a reference previously handed out by this provider.
    fn release(&self, node: &UiNode) {
        let _ = node;
    }

    /// Current tree generation. Bumps whenever the active window is replaced.
    fn generation(&self) -> u64 {
        0
    }
}

/// Depth-first pre-order collection of nodes under `root` (inclusive) matching `pred`.
///
/// `root` stays borrowed. Matches are returned acquired; every other node fetched along
/// the way is released once its subtree has been visited.
pub fn collect_matching<P>(
    provider: &P,
    root: &UiNode,
    pred: &dyn Fn(&UiNode) -> bool,
) -> Vec<UiNode>
where
    P: TreeProvider + ?Sized,
{
    let mut out = Vec::new();
    if pred(root) {
        out.push(provider.obtain(root));
    }
    for child in provider.children(root) {
        visit(provider, child, pred, &mut out);
    }
    out
}

/// Visit an acquired node, keeping it when it matches and releasing it otherwise.
fn visit<P>(provider: &P, node: UiNode, pred: &dyn Fn(&UiNode) -> bool, out: &mut Vec<UiNode>)
where
    P: TreeProvider + ?Sized,
{
    let keep = pred(&node);
    if keep {
        out.push(node.clone());
    }
    for child in provider.children(&node) {
        visit(provider, child, pred, out);
    }
    if !keep {
        provider.release(&node);
    }
}
