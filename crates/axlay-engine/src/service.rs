//! The detection service: one explicitly constructed object owning every component.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use axlay_protocol::{LocateResult, Selector, Snapshot, WindowEvent};
use axlay_tree::{NodeRef, Tree, TreeProvider};
use config::{Config, Rule};
use serde::Serialize;
use tokio::{runtime::Handle, task::spawn_blocking};
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    batch::{BatchOutcome, BatchQueryCoordinator},
    condition::ConditionEvaluator,
    gate::{DrawGate, RuleMatchState},
    locator::StabilityLocator,
    observer::{RawEvent, TreeObserver},
    overlay::{OverlayRegistry, OverlaySurface},
    sink::{EventDispatcher, EventSink},
    snapshot::{StateSnapshotStore, TextOverrides},
};

/// Outcome of one rule cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Name of the rule that matched, if any.
    pub rule: Option<String>,
    /// One result per overlay request of the matched rule.
    pub results: Vec<LocateResult>,
    /// Overlays created or updated.
    pub drawn: usize,
    /// True when the batch was superseded before finishing.
    pub cancelled: bool,
}

/// Owns the observer, evaluator, locator, batch coordinator, overlay registry,
/// snapshot store and event dispatcher, and wires them to the shared flags.
///
/// Raw platform events enter through [`Detector::on_raw_event`], which never blocks.
/// Rule cycles run through [`Detector::run_rules`] on the tokio runtime.
pub struct Detector {
    config: Config,
    tree: Tree,
    observer: TreeObserver,
    conditions: ConditionEvaluator,
    locator: StabilityLocator,
    batch: BatchQueryCoordinator,
    gate: Arc<DrawGate>,
    rule_state: Arc<RuleMatchState>,
    overlays: OverlayRegistry,
    snapshots: Arc<StateSnapshotStore>,
    dispatcher: EventDispatcher,
    connected_once: AtomicBool,
}

impl Detector {
    /// Build a detector on the current tokio runtime.
    ///
    /// Fails with `ServiceUnavailable` when called outside a runtime.
    pub fn new(
        provider: Arc<dyn TreeProvider>,
        surface: Arc<dyn OverlaySurface>,
        sink: Arc<dyn EventSink>,
        config: Config,
    ) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| Error::ServiceUnavailable(e.to_string()))?;
        let detection = config.detection;
        let tree = Tree::new(provider);
        let gate = Arc::new(DrawGate::new());
        let rule_state = Arc::new(RuleMatchState::new());
        let snapshots = Arc::new(StateSnapshotStore::with_capacity(detection.snapshot_capacity));
        let locator = StabilityLocator::from_detection(tree.clone(), &detection);
        let batch = BatchQueryCoordinator::new(
            tree.clone(),
            locator.clone(),
            gate.clone(),
            rule_state.clone(),
            snapshots.clone(),
            Arc::new(TextOverrides::new()),
        );
        Ok(Self {
            observer: TreeObserver::new(tree.clone(), &config.filters, detection.content_throttle()),
            conditions: ConditionEvaluator::new(tree.clone(), detection.condition_cache_ttl()),
            overlays: OverlayRegistry::new(surface, gate.clone()),
            dispatcher: EventDispatcher::new(sink, detection.sink_retry(), handle),
            connected_once: AtomicBool::new(false),
            config,
            tree,
            locator,
            batch,
            gate,
            rule_state,
            snapshots,
        })
    }

    /// Record a service connection and announce it.
    ///
    /// The first connection of the process leaves detection as it was; reconnections
    /// re-enable it. Returns true for the first connection.
    pub fn on_service_connected(&self) -> bool {
        let first = !self.connected_once.swap(true, Ordering::SeqCst);
        if !first {
            self.observer.set_enabled(true);
        }
        info!(first, "service connected");
        self.dispatcher.emit(WindowEvent::service_connected(first));
        first
    }

    /// Begin distilling raw events.
    pub fn start_detection(&self) {
        self.observer.set_enabled(true);
        info!("detection started");
    }

    /// Stop distilling events and drop all per-window state.
    pub fn stop_detection(&self) {
        self.observer.set_enabled(false);
        self.observer.reset();
        self.batch.cancel_active();
        self.rule_state.set(false);
        self.gate.deny();
        self.overlays.remove_all_overlays();
        self.conditions.clear_cache();
        info!("detection stopped");
    }

    /// True while raw events are being distilled.
    pub fn is_detecting(&self) -> bool {
        self.observer.is_enabled()
    }

    /// Set whether a rule matches the current window.
    ///
    /// Dropping to unmatched removes every overlay.
    pub fn update_rule_match_status(&self, matched: bool) {
        let was = self.rule_state.set(matched);
        if was && !matched {
            self.overlays.remove_all_overlays();
        }
        if was != matched {
            debug!(matched, "rule match changed");
        }
    }

    /// Feed one raw platform event. Returns the distilled event when one was emitted.
    ///
    /// Every emitted event cancels the running batch and closes the draw gate before
    /// it is queued for delivery.
    pub fn on_raw_event(&self, raw: &RawEvent) -> Option<WindowEvent> {
        let event = self.observer.on_raw_event(raw)?;
        if self.batch.cancel_active() {
            debug!(kind = ?event.kind, "window event superseded running batch");
        }
        self.dispatcher.emit(event.clone());
        Some(event)
    }

    /// Locate one selector immediately, without waiting for stability.
    pub async fn find_element(&self, selector: &str) -> LocateResult {
        let sel = match Selector::parse(selector) {
            Ok(sel) => sel,
            Err(e) => return LocateResult::failed(Error::from(e).to_string()),
        };
        match self.locator.find_now(&sel).await {
            Ok(node) => LocateResult::found(&node.bounds(), node.is_visible()),
            Err(e) => LocateResult::failed(e.to_string()),
        }
    }

    /// Run the rule cycle for `event`: pick the first rule whose conditions hold,
    /// locate its elements and draw its overlays.
    ///
    /// A superseded cycle touches no overlays.
    pub async fn run_rules(&self, event: &WindowEvent) -> CycleReport {
        let rule = self.match_rule(event).await;
        self.update_rule_match_status(rule.is_some());
        let Some(rule) = rule else {
            return CycleReport::default();
        };

        let BatchOutcome { results, cancelled } = self.batch.run(&rule.overlays).await;
        let mut drawn = 0;
        if cancelled {
            debug!(rule = %rule.name, "cycle superseded; overlays left to the newer cycle");
        } else {
            for (i, (req, res)) in rule.overlays.iter().zip(&results).enumerate() {
                let id = format!("{}#{i}", rule.name);
                if res.success {
                    if self.overlays.update_overlay(&id, &req.overlay.placed_at(res)) {
                        drawn += 1;
                    }
                } else {
                    self.overlays.remove_overlay(&id);
                }
            }
        }
        info!(rule = %rule.name, drawn, cancelled, "rule cycle finished");
        CycleReport {
            rule: Some(rule.name.clone()),
            results,
            drawn,
            cancelled,
        }
    }

    async fn match_rule(&self, event: &WindowEvent) -> Option<&Rule> {
        let package = event.package_name.as_deref()?;
        let activity = event.relative_activity_name.as_deref();
        let candidates: Vec<&Rule> = self.config.rules_for(package, activity).collect();
        if candidates.is_empty() {
            debug!(package, ?activity, "no rule for window");
            return None;
        }
        let root = self.active_root().await?;
        for rule in candidates {
            if self
                .conditions
                .evaluate(&root, rule.allow_list(), rule.deny_list())
                .await
            {
                debug!(rule = %rule.name, "rule conditions hold");
                return Some(rule);
            }
        }
        None
    }

    async fn active_root(&self) -> Option<NodeRef> {
        let tree = self.tree.clone();
        match spawn_blocking(move || tree.root()).await {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "active root lookup failed");
                None
            }
        }
    }

    /// Cancel any in-flight batch and close the draw gate.
    pub fn cancel_search(&self) -> bool {
        self.batch.cancel_active()
    }

    /// Newest snapshot, if any.
    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.latest()
    }

    /// Retained snapshots, newest first.
    pub fn snapshot_history(&self) -> Vec<Arc<Snapshot>> {
        self.snapshots.history()
    }

    /// The overlay registry.
    pub fn overlays(&self) -> &OverlayRegistry {
        &self.overlays
    }

    /// True when overlays may currently be drawn.
    pub fn is_drawing_allowed(&self) -> bool {
        self.gate.is_drawing_allowed()
    }

    /// True when a rule matches the current window.
    pub fn is_rule_matched(&self) -> bool {
        self.rule_state.is_matched()
    }

    /// Events waiting for the sink.
    pub fn pending_events(&self) -> usize {
        self.dispatcher.pending()
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tear down: stop detection, stop delivery retries and clear overlays.
    pub fn shutdown(&self) {
        self.stop_detection();
        self.dispatcher.shutdown();
        info!("detector shut down");
    }
}
