//! In-memory tree provider built from a serializable description.

use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BoundingBox, Error, NodeFlags, NodeId, NodeInfo, Result, TreeProvider, UiNode};

/// Serializable description of a node and its subtree.
///
/// Field names match `axlay_protocol::SnapshotNode`, so a captured snapshot can be
/// loaded back as a tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
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
    /// State flags, stored inline next to the other fields.
    #[serde(flatten)]
    pub flags: NodeFlags,
    /// Child nodes in document order.
    pub children: Vec<Self>,
}

impl NodeSpec {
    /// Visible, enabled node of class `class_name`.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            flags: NodeFlags {
                enabled: true,
                visible: true,
                ..NodeFlags::default()
            },
            ..Self::default()
        }
    }

    /// Set the text.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the content description.
    #[must_use]
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.content_description = Some(desc.into());
        self
    }

    /// Set the resource id.
    #[must_use]
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Set the package.
    #[must_use]
    pub fn package(mut self, pkg: impl Into<String>) -> Self {
        self.package_name = Some(pkg.into());
        self
    }

    /// Set the bounds.
    #[must_use]
    pub fn bounds(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        self.bounds = BoundingBox::new(left, top, right, bottom);
        self
    }

    /// Mark the node clickable.
    #[must_use]
    pub fn clickable(mut self) -> Self {
        self.flags.clickable = true;
        self
    }

    /// Append a child.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// Parse a JSON tree dump.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read and parse a JSON tree dump. A file holding a whole snapshot
    /// (`{"timestamp_ms": .., "root": {..}}`) is accepted as well.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        #[derive(Deserialize)]
        struct Wrapped {
            root: NodeSpec,
        }
        if let Ok(w) = serde_json::from_str::<Wrapped>(&raw) {
            return Ok(w.root);
        }
        Self::from_json(&raw)
    }
}

/// One flattened tree generation.
#[derive(Default)]
struct Arena {
    generation: u64,
    /// Id of `nodes[0]`; ids are `base + index`.
    base: u64,
    nodes: Vec<Arc<NodeInfo>>,
    children: Vec<Vec<usize>>,
    /// Index of the root, when a window is active.
    root: Option<usize>,
}

impl Arena {
    fn build(spec: &NodeSpec, generation: u64, base: u64) -> Self {
        let mut arena = Self {
            generation,
            base,
            ..Self::default()
        };
        let root = arena.push(spec);
        arena.root = Some(root);
        arena
    }

    fn push(&mut self, spec: &NodeSpec) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Arc::new(NodeInfo {
            id: NodeId(self.base + idx as u64),
            class_name: spec.class_name.clone(),
            text: spec.text.clone(),
            content_description: spec.content_description.clone(),
            package_name: spec.package_name.clone(),
            resource_id: spec.resource_id.clone(),
            bounds: spec.bounds,
            flags: spec.flags,
        }));
        self.children.push(Vec::new());
        for child in &spec.children {
            let c = self.push(child);
            self.children[idx].push(c);
        }
        idx
    }

    fn node(&self, idx: usize) -> UiNode {
        UiNode::new(self.nodes[idx].clone(), self.generation)
    }

    fn index_of(&self, node: &UiNode) -> Option<usize> {
        if node.generation() != self.generation {
            return None;
        }
        let idx = node.id().0.checked_sub(self.base)? as usize;
        (idx < self.nodes.len()).then_some(idx)
    }
}

/// Tree provider over an in-memory arena.
///
/// Counts every reference handed out and every release, so callers can check that
/// traversals return what they borrow.
pub struct StaticTree {
    arena: Mutex<Arena>,
    next_base: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl StaticTree {
    /// Provider whose active window is `spec`.
    pub fn new(spec: &NodeSpec) -> Self {
        let tree = Self::empty();
        tree.replace(spec);
        tree
    }

    /// Provider with no active window.
    pub fn empty() -> Self {
        Self {
            arena: Mutex::new(Arena::default()),
            next_base: AtomicU64::new(1),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Load a provider from a JSON tree dump.
    pub fn from_path(path: &Path) -> Result<Self> {
        let spec = NodeSpec::from_path(path)?;
        debug!(path = %path.display(), "loaded tree dump");
        Ok(Self::new(&spec))
    }

    /// Swap in a new window. Bumps the generation; nodes from the old window go stale.
    pub fn replace(&self, spec: &NodeSpec) {
        let mut arena = self.arena.lock();
        let count = count_nodes(spec) as u64;
        let base = self.next_base.fetch_add(count, Ordering::SeqCst);
        *arena = Arena::build(spec, arena.generation + 1, base);
    }

    /// Remove the active window. Bumps the generation.
    pub fn clear(&self) {
        let mut arena = self.arena.lock();
        let generation = arena.generation + 1;
        *arena = Arena {
            generation,
            ..Arena::default()
        };
    }

    /// Number of nodes in the active window.
    pub fn len(&self) -> usize {
        self.arena.lock().nodes.len()
    }

    /// True when there is no active window.
    pub fn is_empty(&self) -> bool {
        self.arena.lock().root.is_none()
    }

    /// References handed out so far.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// References released so far.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// References handed out and not yet released.
    pub fn outstanding(&self) -> i64 {
        self.acquired() as i64 - self.released() as i64
    }

    fn acquire(&self, node: UiNode) -> UiNode {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        node
    }
}

fn count_nodes(spec: &NodeSpec) -> usize {
    1 + spec.children.iter().map(count_nodes).sum::<usize>()
}

impl TreeProvider for StaticTree {
    fn active_root(&self) -> Option<UiNode> {
        let node = {
            let arena = self.arena.lock();
            arena.root.map(|r| arena.node(r))
        };
        node.map(|n| self.acquire(n))
    }

    fn children(&self, node: &UiNode) -> Vec<UiNode> {
        let kids: Vec<UiNode> = {
            let arena = self.arena.lock();
            match arena.index_of(node) {
                Some(idx) => arena.children[idx].iter().map(|&c| arena.node(c)).collect(),
                None => Vec::new(),
            }
        };
        kids.into_iter().map(|n| self.acquire(n)).collect()
    }

    fn obtain(&self, node: &UiNode) -> UiNode {
        self.acquire(node.clone())
    }

    fn release(&self, _node: &UiNode) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn generation(&self) -> u64 {
        self.arena.lock().generation
    }
}
