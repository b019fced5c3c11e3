//! Serialized tree snapshots.

use serde::{Deserialize, Serialize};

use crate::node::{BoundingBox, NodeFlags};

/// One node of a serialized tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotNode {
    /// Widget class.
    pub class_name: Option<String>,
    /// Text, or the overlay replacement text when one was registered.
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
    #[serde(flatten)]
    pub flags: NodeFlags,
    /// Children in document order.
    pub children: Vec<Self>,
}

impl SnapshotNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }

    /// Depth-first pre-order iterator over this subtree.
    pub fn iter(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// A serialized tree plus the time it was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Root of the captured tree.
    pub root: SnapshotNode,
}

impl Snapshot {
    /// Compact JSON encoding.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Indented JSON encoding.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
