//! Bounded snapshot history and overlay text overrides.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use axlay_protocol::{Snapshot, SnapshotNode, now_ms};
use axlay_tree::{NodeId, Tree, UiNode};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Replacement text registered for located nodes, rendered into snapshots in place
/// of the tree's own text. Cleared at the start of every detection cycle.
#[derive(Debug, Default)]
pub struct TextOverrides {
    map: Mutex<HashMap<NodeId, String>>,
}

impl TextOverrides {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `text` for `id`, replacing any earlier override.
    pub fn set(&self, id: NodeId, text: impl Into<String>) {
        self.map.lock().insert(id, text.into());
    }

    /// Register `text` for `id` unless `scope` has been cancelled.
    ///
    /// The check and the insert happen under the map lock, so a cycle that cancels
    /// `scope` and then calls [`TextOverrides::clear`] never sees the entry.
    pub fn set_in_scope(
        &self,
        id: NodeId,
        text: impl Into<String>,
        scope: &CancellationToken,
    ) -> bool {
        let mut map = self.map.lock();
        if scope.is_cancelled() {
            return false;
        }
        map.insert(id, text.into());
        true
    }

    /// Override for `id`, if any.
    pub fn get(&self, id: NodeId) -> Option<String> {
        self.map.lock().get(&id).cloned()
    }

    /// Drop every override.
    pub fn clear(&self) {
        self.map.lock().clear();
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// True when no override is registered.
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

/// Serialize the subtree at `root` depth-first, substituting override text.
///
/// Children are fetched and released one subtree at a time.
pub fn capture(tree: &Tree, root: &UiNode, overrides: &TextOverrides) -> Snapshot {
    Snapshot {
        timestamp_ms: now_ms(),
        root: serialize(tree, root, overrides),
    }
}

fn serialize(tree: &Tree, node: &UiNode, overrides: &TextOverrides) -> SnapshotNode {
    let info = node.info();
    let children = tree
        .children(node)
        .into_iter()
        .map(|child| serialize(tree, &child, overrides))
        .collect();
    SnapshotNode {
        class_name: info.class_name.clone(),
        text: overrides.get(info.id).or_else(|| info.text.clone()),
        content_description: info.content_description.clone(),
        package_name: info.package_name.clone(),
        resource_id: info.resource_id.clone(),
        bounds: info.bounds,
        flags: info.flags,
        children,
    }
}

/// Most-recent-first history of snapshots, bounded by capacity.
///
/// Saving beyond capacity evicts the oldest entry.
#[derive(Debug)]
pub struct StateSnapshotStore {
    capacity: usize,
    queue: Mutex<VecDeque<Arc<Snapshot>>>,
}

impl Default for StateSnapshotStore {
    fn default() -> Self {
        Self::with_capacity(10)
    }
}

impl StateSnapshotStore {
    /// Store holding at most `capacity` snapshots (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Capture the tree under `root` and push it to the front.
    pub fn save(&self, tree: &Tree, root: &UiNode, overrides: &TextOverrides) -> Arc<Snapshot> {
        let snap = Arc::new(capture(tree, root, overrides));
        self.push(snap.clone());
        snap
    }

    /// Push an already captured snapshot to the front.
    pub fn push(&self, snapshot: Arc<Snapshot>) {
        let mut q = self.queue.lock();
        q.push_front(snapshot);
        while q.len() > self.capacity {
            q.pop_back();
        }
        trace!(len = q.len(), "snapshot saved");
    }

    /// Newest snapshot.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.queue.lock().front().cloned()
    }

    /// All retained snapshots, newest first.
    pub fn history(&self) -> Vec<Arc<Snapshot>> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when nothing has been saved.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Maximum number of retained snapshots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all snapshots.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use axlay_tree::{NodeSpec, StaticTree};

    use super::*;

    #[test]
    fn eleven_saves_keep_the_newest_ten() {
        let provider = Arc::new(StaticTree::new(&NodeSpec::new("Root").text("Step 0")));
        let tree = Tree::new(provider.clone());
        let store = StateSnapshotStore::default();
        for i in 0..11 {
            provider.replace(&NodeSpec::new("Root").text(format!("Step {i}")));
            let root = tree.root().unwrap();
            store.save(&tree, &root, &TextOverrides::new());
        }
        assert_eq!(store.len(), 10);
        assert_eq!(store.latest().unwrap().root.text.as_deref(), Some("Step 10"));
        let steps: Vec<_> = store
            .history()
            .iter()
            .map(|s| s.root.text.clone().unwrap())
            .collect();
        let expected: Vec<_> = (1..11).rev().map(|i| format!("Step {i}")).collect();
        assert_eq!(steps, expected);
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn cancelled_scope_registers_nothing() {
        let overrides = TextOverrides::new();
        let scope = CancellationToken::new();
        assert!(overrides.set_in_scope(NodeId(1), "a", &scope));
        scope.cancel();
        assert!(!overrides.set_in_scope(NodeId(2), "b", &scope));
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn empty_store_has_no_latest() {
        let store = StateSnapshotStore::with_capacity(0);
        assert!(store.latest().is_none());
        assert_eq!(store.capacity(), 1);
    }

    #[test]
    fn capture_renders_overrides_and_releases_children() {
        let provider = Arc::new(StaticTree::new(
            &NodeSpec::new("Root").child(
                NodeSpec::new("android.widget.TextView")
                    .text("Price: 10")
                    .bounds(1, 2, 3, 4),
            ),
        ));
        let tree = Tree::new(provider.clone());
        let overrides = TextOverrides::new();
        let store = StateSnapshotStore::default();
        {
            let root = tree.root().unwrap();
            let child = tree.children(&root).remove(0);
            overrides.set(child.id(), "Price: 0");
            drop(child);

            let snap = store.save(&tree, &root, &overrides);
            let label = &snap.root.children[0];
            assert_eq!(label.text.as_deref(), Some("Price: 0"));
            assert_eq!(label.bounds.right, 3);
            assert_eq!(snap.root.class_name.as_deref(), Some("Root"));
        }
        assert_eq!(provider.outstanding(), 0);
        assert_eq!(store.len(), 1);
    }
}
