//! Locate requests and their per-request results.

use serde::{Deserialize, Serialize};

use crate::{node::BoundingBox, overlay::OverlaySpec, selector::Selector};

/// Message reported for every request when no rule matches the current window.
pub const MSG_NO_RULE: &str = "No matching rule for current window";
/// Message reported for requests superseded by a newer batch.
pub const MSG_CANCELLED: &str = "Search cancelled";
/// Message reported when the retry budget ran out without a stable match.
pub const MSG_NOT_FOUND: &str = "Element not found";

/// One element to locate, plus the overlay to draw over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateRequest {
    /// Which node to find.
    #[serde(alias = "uiAutomatorCode")]
    pub selector: Selector,
    /// Rendering payload; geometry is filled in from the located bounds.
    #[serde(default)]
    pub overlay: OverlaySpec,
}

impl LocateRequest {
    /// Request with a default overlay payload.
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            overlay: OverlaySpec::default(),
        }
    }

    /// Attach an overlay payload.
    #[must_use]
    pub fn with_overlay(mut self, overlay: OverlaySpec) -> Self {
        self.overlay = overlay;
        self
    }
}

/// Top-left corner of a located node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
}

/// Extent of a located node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    /// Horizontal extent.
    pub width: i32,
    /// Vertical extent.
    pub height: i32,
}

/// Outcome of one locate request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocateResult {
    /// True when a stable node was found.
    pub success: bool,
    /// Position of the node, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Size of the node, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Whether the node was visible to the user.
    #[serde(default)]
    pub visible: bool,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LocateResult {
    /// Successful result positioned at `bounds`.
    pub fn found(bounds: &BoundingBox, visible: bool) -> Self {
        Self {
            success: true,
            coordinates: Some(Coordinates {
                x: bounds.left,
                y: bounds.top,
            }),
            size: Some(Size {
                width: bounds.width(),
                height: bounds.height(),
            }),
            visible,
            message: None,
        }
    }

    /// Failed result carrying `message`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            coordinates: None,
            size: None,
            visible: false,
            message: Some(message.into()),
        }
    }

    /// Failure caused by a superseding batch.
    pub fn cancelled() -> Self {
        Self::failed(MSG_CANCELLED)
    }

    /// True for a cancelled result.
    pub fn is_cancelled(&self) -> bool {
        !self.success && self.message.as_deref() == Some(MSG_CANCELLED)
    }
}
