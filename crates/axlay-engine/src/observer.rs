//! Distills raw platform tree notifications into `WindowEvent`s.
//!
//! Window-state changes are deduplicated by a structural fingerprint of the whole
//! active tree; content changes are throttled per `(package, class)` pair. Host-shell
//! nodes (status bar and friends) are left out of the fingerprint so a ticking clock
//! does not count as a new window.

use std::{
    hash::{DefaultHasher, Hash, Hasher},
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use axlay_protocol::{WindowEvent, relative_activity_name};
use axlay_tree::{Tree, UiNode};
use config::Filters;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Kind of raw notification delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// The foreground window changed.
    WindowStateChanged,
    /// Content inside a window changed.
    ContentChanged,
    /// Anything else; ignored.
    Other,
}

/// Raw notification as delivered by the platform event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Notification kind.
    pub kind: RawEventKind,
    /// Package of the window the notification came from.
    pub package_name: Option<String>,
    /// Class of the source; the activity for window-state changes.
    pub class_name: Option<String>,
    /// Platform content-change bit mask.
    pub change_types: u32,
}

impl RawEvent {
    /// Window-state change for `package`/`class`.
    pub fn state_changed(package: &str, class: &str) -> Self {
        Self {
            kind: RawEventKind::WindowStateChanged,
            package_name: Some(package.to_string()),
            class_name: Some(class.to_string()),
            change_types: 0,
        }
    }

    /// Content change for `package`/`class`.
    pub fn content_changed(package: &str, class: &str) -> Self {
        Self {
            kind: RawEventKind::ContentChanged,
            package_name: Some(package.to_string()),
            class_name: Some(class.to_string()),
            change_types: 0,
        }
    }
}

/// Package-prefix denylist.
#[derive(Debug, Clone, Default)]
pub struct Denylist {
    prefixes: Vec<String>,
}

impl Denylist {
    /// Denylist over `prefixes`.
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// True when `package` starts with any listed prefix.
    pub fn contains(&self, package: &str) -> bool {
        self.prefixes.iter().any(|p| package.starts_with(p.as_str()))
    }
}

/// Predicate deciding whether a node belongs to the host shell.
#[derive(Debug, Clone, Default)]
pub struct ShellFilter {
    packages: Vec<String>,
    resource_ids: Vec<String>,
}

impl ShellFilter {
    /// Shell filter from package names and resource-id fragments.
    pub fn new(packages: Vec<String>, resource_ids: Vec<String>) -> Self {
        Self {
            packages,
            resource_ids,
        }
    }

    /// True when `node` is part of the host shell.
    pub fn is_shell(&self, node: &UiNode) -> bool {
        let pkg_hit = node
            .package_name()
            .is_some_and(|p| self.packages.iter().any(|s| s == p));
        let id_hit = node
            .resource_id()
            .is_some_and(|id| self.resource_ids.iter().any(|s| id.contains(s.as_str())));
        pkg_hit || id_hit
    }
}

/// Mutable observer state, guarded by one lock.
#[derive(Debug, Default)]
struct ObserverState {
    last_package: Option<String>,
    last_activity: Option<String>,
    last_fingerprint: Option<u64>,
    /// Key and time of the last content change let through.
    last_content: Option<((Option<String>, Option<String>), Instant)>,
}

/// Filters and normalizes raw tree notifications. Starts disabled.
#[derive(Debug)]
pub struct TreeObserver {
    tree: Tree,
    enabled: AtomicBool,
    denylist: Denylist,
    shell: ShellFilter,
    throttle: Duration,
    state: Mutex<ObserverState>,
}

impl TreeObserver {
    /// Observer over `tree` using `filters` and the content throttle window.
    pub fn new(tree: Tree, filters: &Filters, throttle: Duration) -> Self {
        Self {
            tree,
            enabled: AtomicBool::new(false),
            denylist: Denylist::new(filters.effective_denylist()),
            shell: ShellFilter::new(
                filters.shell_packages.clone(),
                filters.shell_resource_ids.clone(),
            ),
            throttle,
            state: Mutex::new(ObserverState::default()),
        }
    }

    /// Turn event processing on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// True when events are being processed.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Forget the last window, fingerprint and throttle state.
    pub fn reset(&self) {
        *self.state.lock() = ObserverState::default();
    }

    /// Package and full activity of the last window let through.
    pub fn current_window(&self) -> (Option<String>, Option<String>) {
        let st = self.state.lock();
        (st.last_package.clone(), st.last_activity.clone())
    }

    /// Process one raw notification, returning the event to emit, if any.
    pub fn on_raw_event(&self, raw: &RawEvent) -> Option<WindowEvent> {
        self.on_raw_event_at(raw, Instant::now())
    }

    /// As [`Self::on_raw_event`], with an explicit clock reading.
    pub fn on_raw_event_at(&self, raw: &RawEvent, now: Instant) -> Option<WindowEvent> {
        if !self.is_enabled() {
            return None;
        }
        if let Some(pkg) = raw.package_name.as_deref()
            && self.denylist.contains(pkg)
        {
            trace!(package = pkg, "ignoring denylisted package");
            return None;
        }
        match raw.kind {
            RawEventKind::WindowStateChanged => self.on_state_changed(raw),
            RawEventKind::ContentChanged => self.on_content_changed(raw, now),
            RawEventKind::Other => None,
        }
    }

    fn on_state_changed(&self, raw: &RawEvent) -> Option<WindowEvent> {
        let Some(fingerprint) = self.fingerprint() else {
            trace!("no active root; state change dropped");
            return None;
        };
        let (package, activity) = {
            let mut st = self.state.lock();
            if st.last_fingerprint == Some(fingerprint) {
                trace!(fingerprint, "unchanged tree; state change suppressed");
                return None;
            }
            st.last_fingerprint = Some(fingerprint);
            st.last_package = raw.package_name.clone();
            st.last_activity = raw.class_name.clone();
            (st.last_package.clone(), st.last_activity.clone())
        };
        debug!(?package, ?activity, "window state changed");
        Some(WindowEvent::state_changed(
            package.clone(),
            relative(package.as_deref(), activity.as_deref()),
        ))
    }

    fn on_content_changed(&self, raw: &RawEvent, now: Instant) -> Option<WindowEvent> {
        let key = (raw.package_name.clone(), raw.class_name.clone());
        let (package, activity) = {
            let mut st = self.state.lock();
            if let Some((last_key, at)) = &st.last_content
                && *last_key == key
                && now.saturating_duration_since(*at) < self.throttle
            {
                trace!(package = ?key.0, "content change throttled");
                return None;
            }
            st.last_content = Some((key, now));
            if st.last_package.is_some() {
                (st.last_package.clone(), st.last_activity.clone())
            } else {
                (raw.package_name.clone(), raw.class_name.clone())
            }
        };
        trace!(?package, ?activity, "content changed");
        Some(WindowEvent::content_changed(
            package.clone(),
            relative(package.as_deref(), activity.as_deref()),
        ))
    }

    /// Structural fingerprint of the active tree: a hash over `(class, text,
    /// description)` of every non-shell node in document order.
    pub fn fingerprint(&self) -> Option<u64> {
        let root = self.tree.root()?;
        let mut hasher = DefaultHasher::new();
        self.hash_subtree(&root, &mut hasher);
        Some(hasher.finish())
    }

    fn hash_subtree(&self, node: &UiNode, hasher: &mut DefaultHasher) {
        if self.excluded(node) {
            return;
        }
        node.class_name().hash(hasher);
        node.text().hash(hasher);
        node.content_description().hash(hasher);
        for child in self.tree.children(node) {
            self.hash_subtree(&child, hasher);
        }
    }

    fn excluded(&self, node: &UiNode) -> bool {
        self.shell.is_shell(node)
            || node
                .package_name()
                .is_some_and(|p| self.denylist.contains(p))
    }
}

fn relative(package: Option<&str>, activity: Option<&str>) -> Option<String> {
    let activity = activity?;
    Some(relative_activity_name(activity, package.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axlay_protocol::WindowEventKind;
    use axlay_tree::{NodeSpec, StaticTree};

    use super::*;

    fn app_screen(title: &str, clock: &str) -> NodeSpec {
        NodeSpec::new("android.widget.FrameLayout").children([
            NodeSpec::new("android.widget.TextView")
                .package("com.android.systemui")
                .resource_id("com.android.systemui:id/clock")
                .text(clock),
            NodeSpec::new("android.widget.TextView")
                .package("com.example")
                .text(title),
        ])
    }

    fn observer(spec: &NodeSpec) -> (TreeObserver, Arc<StaticTree>) {
        let provider = Arc::new(StaticTree::new(spec));
        let obs = TreeObserver::new(
            Tree::new(provider.clone()),
            &Filters::default(),
            Duration::from_millis(500),
        );
        obs.set_enabled(true);
        (obs, provider)
    }

    #[test]
    fn disabled_observer_emits_nothing() {
        let (obs, _) = observer(&app_screen("Home", "10:00"));
        obs.set_enabled(false);
        assert!(
            obs.on_raw_event(&RawEvent::state_changed("com.example", "com.example.Main"))
                .is_none()
        );
    }

    #[test]
    fn identical_trees_emit_one_state_change() {
        let (obs, provider) = observer(&app_screen("Home", "10:00"));
        let raw = RawEvent::state_changed("com.example", "com.example.MainActivity");
        let ev = obs.on_raw_event(&raw).unwrap();
        assert_eq!(ev.kind, WindowEventKind::WindowStateChanged);
        assert_eq!(ev.package_name.as_deref(), Some("com.example"));
        assert_eq!(ev.relative_activity_name.as_deref(), Some(".MainActivity"));
        assert!(obs.on_raw_event(&raw).is_none());

        // Shell nodes are outside the fingerprint.
        provider.replace(&app_screen("Home", "10:01"));
        assert!(obs.on_raw_event(&raw).is_none());

        provider.replace(&app_screen("Settings", "10:01"));
        assert!(obs.on_raw_event(&raw).is_some());
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn state_change_without_root_is_dropped() {
        let (obs, provider) = observer(&app_screen("Home", "10:00"));
        provider.clear();
        assert!(
            obs.on_raw_event(&RawEvent::state_changed("com.example", "A"))
                .is_none()
        );
    }

    #[test]
    fn denylisted_packages_and_own_package_are_ignored() {
        let (obs, _) = observer(&app_screen("Home", "10:00"));
        for pkg in ["com.google.android.googlequicksearchbox", "dev.axlay.debug"] {
            assert!(obs.on_raw_event(&RawEvent::state_changed(pkg, "X")).is_none());
            assert!(obs.on_raw_event(&RawEvent::content_changed(pkg, "X")).is_none());
        }
    }

    #[test]
    fn content_changes_are_throttled_per_key() {
        let (obs, _) = observer(&app_screen("Home", "10:00"));
        obs.on_raw_event(&RawEvent::state_changed("com.example", "com.example.Main"))
            .unwrap();

        let t0 = Instant::now();
        let raw = RawEvent::content_changed("com.example", "android.widget.ListView");
        let ev = obs.on_raw_event_at(&raw, t0).unwrap();
        assert!(ev.content_changed);
        assert_eq!(ev.relative_activity_name.as_deref(), Some(".Main"));

        assert!(
            obs.on_raw_event_at(&raw, t0 + Duration::from_millis(200))
                .is_none()
        );
        let other = RawEvent::content_changed("com.example", "android.widget.TextView");
        assert!(
            obs.on_raw_event_at(&other, t0 + Duration::from_millis(250))
                .is_some()
        );
        assert!(
            obs.on_raw_event_at(&raw, t0 + Duration::from_millis(800))
                .is_some()
        );
    }

    #[test]
    fn content_change_before_any_window_uses_its_own_source() {
        let (obs, _) = observer(&app_screen("Home", "10:00"));
        let ev = obs
            .on_raw_event(&RawEvent::content_changed("com.example", "com.example.Feed"))
            .unwrap();
        assert_eq!(ev.package_name.as_deref(), Some("com.example"));
        assert_eq!(ev.relative_activity_name.as_deref(), Some(".Feed"));
    }

    #[test]
    fn reset_forgets_the_fingerprint() {
        let (obs, _) = observer(&app_screen("Home", "10:00"));
        let raw = RawEvent::state_changed("com.example", "A");
        assert!(obs.on_raw_event(&raw).is_some());
        obs.reset();
        assert!(obs.on_raw_event(&raw).is_some());
    }
}
