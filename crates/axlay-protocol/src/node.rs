//! Geometry and state flags shared by live tree nodes and serialized snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Screen-space rectangle of a node, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl BoundingBox {
    /// Construct from edges.
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Horizontal extent; negative boxes report zero.
    #[must_use]
    pub const fn width(&self) -> i32 {
        if self.right > self.left {
            self.right - self.left
        } else {
            0
        }
    }

    /// Vertical extent; negative boxes report zero.
    #[must_use]
    pub const fn height(&self) -> i32 {
        if self.bottom > self.top {
            self.bottom - self.top
        } else {
            0
        }
    }

    /// True when the box covers no area.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Same box moved by `(dx, dy)`.
    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Boolean state attributes of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeFlags {
    /// Has a checked state.
    pub checkable: bool,
    /// Currently checked.
    pub checked: bool,
    /// Responds to clicks.
    pub clickable: bool,
    /// Accepts text input.
    pub editable: bool,
    /// Interactive.
    pub enabled: bool,
    /// Holds input focus.
    pub focused: bool,
    /// Can take input focus.
    pub focusable: bool,
    /// Responds to long presses.
    pub long_clickable: bool,
    /// Scrolls its content.
    pub scrollable: bool,
    /// Currently selected.
    pub selected: bool,
    /// Visible to the user.
    pub visible: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_boxes_have_zero_extent() {
        let b = BoundingBox::new(10, 10, 5, 40);
        assert_eq!(b.width(), 0);
        assert_eq!(b.height(), 30);
        assert!(b.is_empty());
        assert_eq!(b.to_string(), "[10,10][5,40]");
    }
}
