//! One cancellable fan-out of locate requests per detection cycle.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use axlay_protocol::{LocateRequest, LocateResult, MSG_NO_RULE};
use axlay_tree::Tree;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Error,
    gate::{DrawGate, RuleMatchState},
    locator::StabilityLocator,
    snapshot::{StateSnapshotStore, TextOverrides},
};

/// Results of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// One result per request, in request order.
    pub results: Vec<LocateResult>,
    /// True when the batch's scope was cancelled before it finished.
    pub cancelled: bool,
}

/// Runs every request of a cycle concurrently under one cancellation scope.
///
/// Starting a batch supersedes the previous one. Completed results keep their value
/// when the scope is cancelled; requests still polling resolve as `Search cancelled`.
pub struct BatchQueryCoordinator {
    tree: Tree,
    locator: StabilityLocator,
    gate: Arc<DrawGate>,
    rule_state: Arc<RuleMatchState>,
    snapshots: Arc<StateSnapshotStore>,
    overrides: Arc<TextOverrides>,
    /// Sequence number and token of the running batch.
    active: Mutex<Option<(u64, CancellationToken)>>,
    /// Last batch sequence number handed out.
    seq: AtomicU64,
}

impl BatchQueryCoordinator {
    /// Coordinator sharing the process-wide flags and stores.
    pub fn new(
        tree: Tree,
        locator: StabilityLocator,
        gate: Arc<DrawGate>,
        rule_state: Arc<RuleMatchState>,
        snapshots: Arc<StateSnapshotStore>,
        overrides: Arc<TextOverrides>,
    ) -> Self {
        Self {
            tree,
            locator,
            gate,
            rule_state,
            snapshots,
            overrides,
            active: Mutex::new(None),
            seq: AtomicU64::new(0),
        }
    }

    /// Locate every request, returning one result per request in order.
    pub async fn locate_all(&self, requests: &[LocateRequest]) -> Vec<LocateResult> {
        self.run(requests).await.results
    }

    /// Like [`BatchQueryCoordinator::locate_all`], also reporting whether the batch
    /// was superseded before it finished.
    pub async fn run(&self, requests: &[LocateRequest]) -> BatchOutcome {
        if !self.rule_state.is_matched() {
            self.gate.deny();
            debug!(requests = requests.len(), "no matching rule; batch skipped");
            return BatchOutcome {
                results: requests
                    .iter()
                    .map(|_| LocateResult::failed(MSG_NO_RULE))
                    .collect(),
                cancelled: false,
            };
        }

        let (id, token) = self.begin();
        self.overrides.clear();
        debug!(batch = id, requests = requests.len(), "batch started");

        let tasks = requests.iter().map(|req| {
            let locator = self.locator.clone();
            let overrides = self.overrides.clone();
            let token = token.clone();
            let selector = req.selector.clone();
            let text = req.overlay.text.clone();
            tokio::spawn(async move {
                match locator.locate(&selector, &token).await {
                    Ok(_) if token.is_cancelled() => {
                        debug!(%selector, "hit arrived after cancel; discarded");
                        LocateResult::cancelled()
                    }
                    Ok(node) => {
                        if !text.is_empty() && !overrides.set_in_scope(node.id(), text, &token) {
                            debug!(%selector, "hit arrived after cancel; discarded");
                            return LocateResult::cancelled();
                        }
                        LocateResult::found(&node.bounds(), node.is_visible())
                    }
                    Err(Error::Cancelled) => LocateResult::cancelled(),
                    Err(e) => {
                        debug!(%selector, error = %e, "locate failed");
                        LocateResult::failed(e.to_string())
                    }
                }
            })
        });
        let results: Vec<LocateResult> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    warn!(error = %e, "locate task failed");
                    LocateResult::failed(e.to_string())
                })
            })
            .collect();

        let cancelled = token.is_cancelled();
        if cancelled {
            info!(batch = id, "batch cancelled");
        } else {
            self.save_snapshot().await;
        }
        self.finish(id);
        BatchOutcome { results, cancelled }
    }

    /// Cancel the running batch, if any, and close the draw gate.
    ///
    /// Returns true when a batch was running.
    pub fn cancel_active(&self) -> bool {
        let prev = {
            let mut active = self.active.lock();
            self.gate.deny();
            active.take()
        };
        match prev {
            Some((id, token)) => {
                token.cancel();
                debug!(batch = id, "batch cancel requested");
                true
            }
            None => false,
        }
    }

    /// True while a batch is in flight.
    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Open the draw gate and install a fresh scope, cancelling the previous one.
    ///
    /// Both happen under the `active` lock so a concurrent cancel sees either neither
    /// or both.
    fn begin(&self) -> (u64, CancellationToken) {
        let id = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let prev = {
            let mut active = self.active.lock();
            self.gate.allow();
            active.replace((id, token.clone()))
        };
        if let Some((prev, old)) = prev {
            old.cancel();
            debug!(batch = prev, superseded_by = id, "previous batch cancelled");
        }
        (id, token)
    }

    fn finish(&self, id: u64) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|(cur, _)| *cur == id) {
            *active = None;
        }
    }

    async fn save_snapshot(&self) {
        let tree = self.tree.clone();
        let store = self.snapshots.clone();
        let overrides = self.overrides.clone();
        let saved = spawn_blocking(move || {
            let root = tree.root()?;
            Some(store.save(&tree, &root, &overrides))
        })
        .await;
        match saved {
            Ok(Some(snap)) => debug!(nodes = snap.root.count(), "snapshot saved"),
            Ok(None) => debug!("no active window; snapshot skipped"),
            Err(e) => warn!(error = %e, "snapshot capture failed"),
        }
    }
}
