//! Process-wide permission flags.
//!
//! Writes use `SeqCst` so a flip on the dispatch path is visible to every worker on
//! its next read.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether overlays may currently be created or updated. Starts closed.
#[derive(Debug, Default)]
pub struct DrawGate {
    allowed: AtomicBool,
}

impl DrawGate {
    /// Closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when overlay mutation is permitted.
    pub fn is_drawing_allowed(&self) -> bool {
        self.allowed.load(Ordering::SeqCst)
    }

    /// Open the gate. Returns the previous state.
    pub fn allow(&self) -> bool {
        self.allowed.swap(true, Ordering::SeqCst)
    }

    /// Close the gate. Returns the previous state.
    pub fn deny(&self) -> bool {
        self.allowed.swap(false, Ordering::SeqCst)
    }
}

/// Whether an automation rule matches the current window. Set externally.
#[derive(Debug, Default)]
pub struct RuleMatchState {
    matched: AtomicBool,
}

impl RuleMatchState {
    /// Unmatched state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    pub fn is_matched(&self) -> bool {
        self.matched.load(Ordering::SeqCst)
    }

    /// Store `matched`, returning the previous value.
    pub fn set(&self, matched: bool) -> bool {
        self.matched.swap(matched, Ordering::SeqCst)
    }
}
