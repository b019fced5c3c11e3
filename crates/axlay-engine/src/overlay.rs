//! Overlay bookkeeping gated by the draw permission.

use std::{collections::HashMap, mem, sync::Arc};

use axlay_protocol::OverlaySpec;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::gate::DrawGate;

/// Rendering backend for overlays.
///
/// Implementations must tolerate ids they have never seen.
pub trait OverlaySurface: Send + Sync {
    /// Show a new overlay.
    fn create(&self, id: &str, spec: &OverlaySpec);
    /// Change an existing overlay.
    fn update(&self, id: &str, spec: &OverlaySpec);
    /// Hide one overlay.
    fn remove(&self, id: &str);
    /// Hide every overlay.
    fn remove_all(&self);
}

/// Tracks live overlays and forwards mutations to a surface.
///
/// `create_overlay` and `update_overlay` silently do nothing while the draw gate is
/// closed; removal always goes through.
pub struct OverlayRegistry {
    surface: Arc<dyn OverlaySurface>,
    gate: Arc<DrawGate>,
    live: Mutex<HashMap<String, OverlaySpec>>,
}

impl OverlayRegistry {
    /// Registry painting on `surface`, gated by `gate`.
    pub fn new(surface: Arc<dyn OverlaySurface>, gate: Arc<DrawGate>) -> Self {
        Self {
            surface,
            gate,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Create or replace overlay `id`. Returns false when suppressed by the gate.
    pub fn create_overlay(&self, id: &str, spec: &OverlaySpec) -> bool {
        if !self.gate.is_drawing_allowed() {
            trace!(id, "create suppressed; drawing not allowed");
            return false;
        }
        self.live.lock().insert(id.to_string(), spec.clone());
        self.surface.create(id, spec);
        debug!(id, text = %spec.text, "overlay created");
        true
    }

    /// Update overlay `id`, creating it when absent. Returns false when suppressed.
    pub fn update_overlay(&self, id: &str, spec: &OverlaySpec) -> bool {
        if !self.gate.is_drawing_allowed() {
            trace!(id, "update suppressed; drawing not allowed");
            return false;
        }
        let existed = self
            .live
            .lock()
            .insert(id.to_string(), spec.clone())
            .is_some();
        if existed {
            self.surface.update(id, spec);
        } else {
            self.surface.create(id, spec);
        }
        true
    }

    /// Remove overlay `id`. Removing an unknown id succeeds.
    pub fn remove_overlay(&self, id: &str) -> bool {
        if self.live.lock().remove(id).is_some() {
            self.surface.remove(id);
        }
        true
    }

    /// Remove every overlay.
    pub fn remove_all_overlays(&self) -> bool {
        let n = {
            let mut live = self.live.lock();
            let n = live.len();
            live.clear();
            n
        };
        self.surface.remove_all();
        if n > 0 {
            debug!(removed = n, "overlays cleared");
        }
        true
    }

    /// Spec currently shown for `id`.
    pub fn get(&self, id: &str) -> Option<OverlaySpec> {
        self.live.lock().get(id).cloned()
    }

    /// Ids of live overlays, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.live.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of live overlays.
    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    /// True when nothing is shown.
    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}

/// One call observed by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OverlayOp {
    /// `OverlaySurface::create`.
    Create {
        /// Overlay id.
        id: String,
        /// Spec passed to the surface.
        spec: OverlaySpec,
    },
    /// `OverlaySurface::update`.
    Update {
        /// Overlay id.
        id: String,
        /// Spec passed to the surface.
        spec: OverlaySpec,
    },
    /// `OverlaySurface::remove`.
    Remove {
        /// Overlay id.
        id: String,
    },
    /// `OverlaySurface::remove_all`.
    RemoveAll,
}

/// Surface that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    ops: Mutex<Vec<OverlayOp>>,
}

impl RecordingSurface {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations so far, oldest first.
    pub fn ops(&self) -> Vec<OverlayOp> {
        self.ops.lock().clone()
    }

    /// Take and clear the recorded operations.
    pub fn take(&self) -> Vec<OverlayOp> {
        mem::take(&mut *self.ops.lock())
    }
}

impl OverlaySurface for RecordingSurface {
    fn create(&self, id: &str, spec: &OverlaySpec) {
        self.ops.lock().push(OverlayOp::Create {
            id: id.to_string(),
            spec: spec.clone(),
        });
    }

    fn update(&self, id: &str, spec: &OverlaySpec) {
        self.ops.lock().push(OverlayOp::Update {
            id: id.to_string(),
            spec: spec.clone(),
        });
    }

    fn remove(&self, id: &str) {
        self.ops.lock().push(OverlayOp::Remove { id: id.to_string() });
    }

    fn remove_all(&self) {
        self.ops.lock().push(OverlayOp::RemoveAll);
    }
}
