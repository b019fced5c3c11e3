//! Shared value types exchanged between the axlay engine, its configuration and
//! whatever consumes its output.
//!
//! Everything here is plain data: serde-serializable, cheap to clone and free of
//! runtime state. The selector micro-syntax lives here as well because it is part of
//! the wire format rules are written in.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

mod locate;
mod node;
mod overlay;
mod selector;
mod snapshot;

pub use locate::{
    Coordinates, LocateRequest, LocateResult, MSG_CANCELLED, MSG_NO_RULE, MSG_NOT_FOUND, Size,
};
pub use node::{BoundingBox, NodeFlags};
pub use overlay::{Align, Color, OverlaySpec, Padding};
pub use selector::{Selector, SelectorError, SelectorKind};
pub use snapshot::{Snapshot, SnapshotNode};

/// Milliseconds since the Unix epoch, saturating at zero for clocks set before 1970.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Activity name relative to its package, always starting with `.`.
///
/// `com.example.ui.Main` under `com.example` becomes `.ui.Main`; a name outside the
/// package is kept whole and gains a leading `.`.
pub fn relative_activity_name(full: &str, package: &str) -> String {
    let rest = full.strip_prefix(package).unwrap_or(full);
    if rest.starts_with('.') {
        rest.to_string()
    } else {
        format!(".{rest}")
    }
}

/// Kind of a normalized window event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowEventKind {
    /// The foreground window changed structurally.
    WindowStateChanged,
    /// Content inside the current window changed.
    ContentChanged,
    /// The accessibility service (re)connected.
    ServiceConnected,
}

/// Normalized event pushed to the outbound sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowEvent {
    /// What happened.
    pub kind: WindowEventKind,
    /// Package owning the foreground window, when known.
    #[serde(default)]
    pub package_name: Option<String>,
    /// Activity name relative to the package (always starts with `.`), when known.
    #[serde(default)]
    pub relative_activity_name: Option<String>,
    /// Wall-clock time the event was produced.
    pub timestamp_ms: u64,
    /// True for content-change events.
    #[serde(default)]
    pub content_changed: bool,
    /// True only for the very first `ServiceConnected` of a process.
    #[serde(default)]
    pub first_connect: bool,
}

impl WindowEvent {
    /// Window-state change for `package`/`activity`.
    pub fn state_changed(package: Option<String>, activity: Option<String>) -> Self {
        Self {
            kind: WindowEventKind::WindowStateChanged,
            package_name: package,
            relative_activity_name: activity,
            timestamp_ms: now_ms(),
            content_changed: false,
            first_connect: false,
        }
    }

    /// Content change inside `package`/`activity`.
    pub fn content_changed(package: Option<String>, activity: Option<String>) -> Self {
        Self {
            kind: WindowEventKind::ContentChanged,
            package_name: package,
            relative_activity_name: activity,
            timestamp_ms: now_ms(),
            content_changed: true,
            first_connect: false,
        }
    }

    /// Service connection notice.
    pub fn service_connected(first_connect: bool) -> Self {
        Self {
            kind: WindowEventKind::ServiceConnected,
            package_name: None,
            relative_activity_name: None,
            timestamp_ms: now_ms(),
            content_changed: false,
            first_connect,
        }
    }
}
