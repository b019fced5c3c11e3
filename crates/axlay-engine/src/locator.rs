//! Stability-gated element location.
//!
//! A match is only accepted once its bounding box is identical on two consecutive
//! polls. The first sighting is never returned directly; a moving element keeps
//! being re-polled until the retry budget runs out.

use std::time::Duration;

use axlay_protocol::{BoundingBox, Selector};
use axlay_tree::{NodeRef, Tree};
use config::Detection;
use tokio::{task::spawn_blocking, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{Error, Result, selector};

/// Progress of one locate call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatePhase {
    /// No match seen yet.
    Searching,
    /// Matched once; waiting for a confirming poll.
    FirstSighting,
    /// Matched again at different bounds; waiting again.
    Confirming,
    /// Two consecutive polls agreed.
    Stable,
    /// Retry budget spent.
    Exhausted,
}

/// Outcome of a single poll.
#[derive(Debug)]
pub enum Probe {
    /// The provider had no active window.
    NoRoot,
    /// The selector matched nothing.
    Miss,
    /// The selector's pick.
    Hit(NodeRef),
}

/// Polls a selector until its match settles.
#[derive(Debug, Clone)]
pub struct StabilityLocator {
    tree: Tree,
    max_retries: u32,
    poll_interval: Duration,
}

impl StabilityLocator {
    /// Locator polling up to `max_retries` times, `poll_interval` apart.
    pub fn new(tree: Tree, max_retries: u32, poll_interval: Duration) -> Self {
        Self {
            tree,
            max_retries,
            poll_interval,
        }
    }

    /// Locator using the detection settings.
    pub fn from_detection(tree: Tree, detection: &Detection) -> Self {
        Self::new(tree, detection.max_retries, detection.poll_interval())
    }

    /// Evaluate `selector` once against the current active window.
    ///
    /// Tree reads happen on the blocking pool.
    pub async fn probe(&self, selector: &Selector) -> Result<Probe> {
        let tree = self.tree.clone();
        let sel = selector.clone();
        spawn_blocking(move || {
            let Some(root) = tree.root() else {
                return Probe::NoRoot;
            };
            match selector::find(&tree, &root, &sel) {
                Some(node) => Probe::Hit(node),
                None => Probe::Miss,
            }
        })
        .await
        .map_err(|e| Error::ServiceUnavailable(e.to_string()))
    }

    /// Single-shot lookup without a stability wait.
    pub async fn find_now(&self, selector: &Selector) -> Result<NodeRef> {
        match self.probe(selector).await? {
            Probe::Hit(node) => Ok(node),
            Probe::Miss => Err(Error::NotFound),
            Probe::NoRoot => Err(Error::ServiceUnavailable("no active window".into())),
        }
    }

    /// Poll until the node `selector` picks holds still.
    ///
    /// Returns `Cancelled` as soon as `cancel` fires (checked before and after every poll
    /// and during waits) and `NotFound` when the budget is spent. A poll that fails
    /// outright counts as one attempt, like a missing window.
    pub async fn locate(&self, selector: &Selector, cancel: &CancellationToken) -> Result<NodeRef> {
        let mut phase = LocatePhase::Searching;
        let mut last: Option<BoundingBox> = None;

        for attempt in 1..=self.max_retries {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let probe = self.probe(selector).await;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match probe {
                Err(e) => {
                    warn!(%selector, attempt, ?phase, error = %e, "poll failed");
                }
                Ok(Probe::NoRoot) => {
                    debug!(%selector, attempt, ?phase, "no active window");
                }
                Ok(Probe::Miss) => {
                    trace!(%selector, attempt, ?phase, "no match");
                }
                Ok(Probe::Hit(node)) => {
                    let bounds = node.bounds();
                    match last {
                        Some(prev) if prev == bounds => {
                            phase = LocatePhase::Stable;
                            debug!(%selector, attempt, %bounds, ?phase, "element stable");
                            return Ok(node);
                        }
                        Some(prev) => {
                            phase = LocatePhase::Confirming;
                            trace!(%selector, attempt, %prev, %bounds, ?phase, "element moved");
                        }
                        None => {
                            phase = LocatePhase::FirstSighting;
                            trace!(%selector, attempt, %bounds, ?phase, "element sighted");
                        }
                    }
                    last = Some(bounds);
                }
            }
            if attempt < self.max_retries {
                tokio::select! {
                    _ = sleep(self.poll_interval) => {}
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                }
            }
        }

        phase = LocatePhase::Exhausted;
        debug!(%selector, retries = self.max_retries, ?phase, "element not found");
        Err(Error::NotFound)
    }
}
