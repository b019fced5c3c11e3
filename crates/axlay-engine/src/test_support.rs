//! Scripted tree providers and fast settings shared by the engine's unit tests and
//! the `tests/` suites.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc::{self, Receiver, Sender},
};

use axlay_tree::{NodeSpec, StaticTree, TreeProvider, UiNode};
use config::Detection;
use parking_lot::Mutex;

/// Low-latency detection settings suitable for tests.
pub fn fast_detection() -> Detection {
    Detection {
        max_retries: 5,
        poll_interval_ms: 10,
        content_throttle_ms: 50,
        condition_cache_ttl_ms: 50,
        snapshot_capacity: 10,
        sink_retry_ms: 10,
    }
}

/// Provider that advances through a list of windows, one per `active_root` call.
///
/// Either sticks on the last frame or cycles back to the first.
pub struct ScriptedTree {
    inner: StaticTree,
    frames: Vec<NodeSpec>,
    cycle: bool,
    polls: AtomicUsize,
    shown: AtomicUsize,
}

impl ScriptedTree {
    /// Provider that stays on the final frame once reached.
    pub fn new(frames: Vec<NodeSpec>) -> Self {
        Self::build(frames, false)
    }

    /// Provider that wraps around to the first frame.
    pub fn cycling(frames: Vec<NodeSpec>) -> Self {
        Self::build(frames, true)
    }

    fn build(frames: Vec<NodeSpec>, cycle: bool) -> Self {
        Self {
            inner: StaticTree::empty(),
            frames,
            cycle,
            polls: AtomicUsize::new(0),
            shown: AtomicUsize::new(usize::MAX),
        }
    }

    /// Number of `active_root` calls so far.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// References handed out and not yet released.
    pub fn outstanding(&self) -> i64 {
        self.inner.outstanding()
    }
}

impl TreeProvider for ScriptedTree {
    fn active_root(&self) -> Option<UiNode> {
        if self.frames.is_empty() {
            return None;
        }
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        let idx = if self.cycle {
            n % self.frames.len()
        } else {
            n.min(self.frames.len() - 1)
        };
        if self.shown.swap(idx, Ordering::SeqCst) != idx {
            self.inner.replace(&self.frames[idx]);
        }
        self.inner.active_root()
    }

    fn children(&self, node: &UiNode) -> Vec<UiNode> {
        self.inner.children(node)
    }

    fn find_by_text(&self, root: &UiNode, text: &str) -> Vec<UiNode> {
        self.inner.find_by_text(root, text)
    }

    fn find_by_resource_id(&self, root: &UiNode, id: &str) -> Vec<UiNode> {
        self.inner.find_by_resource_id(root, id)
    }

    fn obtain(&self, node: &UiNode) -> UiNode {
        self.inner.obtain(node)
    }

    fn release(&self, node: &UiNode) {
        self.inner.release(node);
    }

    fn generation(&self) -> u64 {
        self.inner.generation()
    }
}

/// Static window whose `active_root` can panic or stall on a chosen call.
///
/// Calls are counted from zero.
pub struct FaultyTree {
    inner: StaticTree,
    calls: AtomicUsize,
    panic_on: Option<usize>,
    pause_on: Option<usize>,
    reached_tx: Sender<()>,
    reached_rx: Mutex<Receiver<()>>,
    resume_tx: Sender<()>,
    resume_rx: Mutex<Receiver<()>>,
}

impl FaultyTree {
    /// Provider serving `spec` with no faults armed.
    pub fn new(spec: &NodeSpec) -> Self {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        Self {
            inner: StaticTree::new(spec),
            calls: AtomicUsize::new(0),
            panic_on: None,
            pause_on: None,
            reached_tx,
            reached_rx: Mutex::new(reached_rx),
            resume_tx,
            resume_rx: Mutex::new(resume_rx),
        }
    }

    /// Panic inside the `n`th `active_root` call.
    pub fn panic_on(mut self, n: usize) -> Self {
        self.panic_on = Some(n);
        self
    }

    /// Block the `n`th `active_root` call until [`FaultyTree::resume`].
    pub fn pause_on(mut self, n: usize) -> Self {
        self.pause_on = Some(n);
        self
    }

    /// Block until the armed pause has been reached.
    pub fn wait_paused(&self) {
        self.reached_rx.lock().recv().ok();
    }

    /// Let the paused call finish.
    pub fn resume(&self) {
        self.resume_tx.send(()).ok();
    }

    /// Number of `active_root` calls so far.
    pub fn polls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// References handed out and not yet released.
    pub fn outstanding(&self) -> i64 {
        self.inner.outstanding()
    }
}

impl TreeProvider for FaultyTree {
    fn active_root(&self) -> Option<UiNode> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on == Some(n) {
            panic!("active_root failed on call {n}");
        }
        if self.pause_on == Some(n) {
            self.reached_tx.send(()).ok();
            self.resume_rx.lock().recv().ok();
        }
        self.inner.active_root()
    }

    fn children(&self, node: &UiNode) -> Vec<UiNode> {
        self.inner.children(node)
    }

    fn obtain(&self, node: &UiNode) -> UiNode {
        self.inner.obtain(node)
    }

    fn release(&self, node: &UiNode) {
        self.inner.release(node);
    }

    fn generation(&self) -> u64 {
        self.inner.generation()
    }
}
