use std::time::Duration;

use axlay_protocol::{LocateRequest, relative_activity_name};
use serde::{Deserialize, Serialize};

/// Package the tool itself runs under; its own windows are never observed.
pub const OWN_PACKAGE: &str = "dev.axlay";

/// Timing and capacity knobs for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Detection {
    /// Polls a locate may spend before giving up.
    pub max_retries: u32,
    /// Delay between locate polls.
    pub poll_interval_ms: u64,
    /// Window in which identical content changes collapse into one.
    pub content_throttle_ms: u64,
    /// How long a condition result stays fresh.
    pub condition_cache_ttl_ms: u64,
    /// Snapshots retained.
    pub snapshot_capacity: usize,
    /// Cadence of redelivery attempts to an unavailable sink.
    pub sink_retry_ms: u64,
}

impl Default for Detection {
    fn default() -> Self {
        Self {
            max_retries: 5,
            poll_interval_ms: 200,
            content_throttle_ms: 500,
            condition_cache_ttl_ms: 1000,
            snapshot_capacity: 10,
            sink_retry_ms: 500,
        }
    }
}

impl Detection {
    /// Delay between locate polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Content-change throttle window.
    pub fn content_throttle(&self) -> Duration {
        Duration::from_millis(self.content_throttle_ms)
    }

    /// Condition cache time-to-live.
    pub fn condition_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.condition_cache_ttl_ms)
    }

    /// Sink retry cadence.
    pub fn sink_retry(&self) -> Duration {
        Duration::from_millis(self.sink_retry_ms)
    }
}

/// Which packages and nodes are treated as noise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Filters {
    /// Package prefixes whose events are dropped.
    pub denylist: Vec<String>,
    /// Packages whose nodes count as host shell (status bar, navigation).
    pub shell_packages: Vec<String>,
    /// Resource-id fragments that mark host-shell nodes.
    pub shell_resource_ids: Vec<String>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            denylist: vec!["com.google.android.googlequicksearchbox".into()],
            shell_packages: vec!["com.android.systemui".into()],
            shell_resource_ids: vec!["status_bar".into()],
        }
    }
}

impl Filters {
    /// The configured denylist with [`OWN_PACKAGE`] appended when missing.
    pub fn effective_denylist(&self) -> Vec<String> {
        let mut out = self.denylist.clone();
        if !out.iter().any(|p| p == OWN_PACKAGE) {
            out.push(OWN_PACKAGE.to_string());
        }
        out
    }
}

/// An automation rule: where it applies, when it is active, and what to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Display name used in logs and errors.
    pub name: String,
    /// Exact package the rule applies to.
    pub package_name: String,
    /// Activity the rule is limited to. Fully qualified or relative (`.Main`).
    #[serde(default)]
    pub activity_name: Option<String>,
    /// Selectors of which at least one must exist (when non-empty).
    #[serde(default)]
    pub allow: Vec<String>,
    /// Selectors none of which may exist.
    #[serde(default)]
    pub deny: Vec<String>,
    /// Elements to locate and annotate when the rule matches.
    #[serde(default)]
    pub overlays: Vec<LocateRequest>,
}

impl Rule {
    /// True when the rule applies to `package` and the relative `activity`.
    pub fn applies_to(&self, package: &str, activity: Option<&str>) -> bool {
        if self.package_name != package {
            return false;
        }
        match (&self.activity_name, activity) {
            (None, _) => true,
            (Some(want), Some(have)) => relative_activity_name(want, package) == have,
            (Some(_), None) => false,
        }
    }

    /// Allow list as an optional slice, `None` when empty.
    pub fn allow_list(&self) -> Option<&[String]> {
        (!self.allow.is_empty()).then_some(self.allow.as_slice())
    }

    /// Deny list as an optional slice, `None` when empty.
    pub fn deny_list(&self) -> Option<&[String]> {
        (!self.deny.is_empty()).then_some(self.deny.as_slice())
    }
}

/// Complete axlay configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Detection timings.
    pub detection: Detection,
    /// Noise filters.
    pub filters: Filters,
    /// Automation rules, in priority order.
    pub rules: Vec<Rule>,
}

impl Config {
    /// Rules applying to `package`/`activity`, in configuration order.
    pub fn rules_for<'a, 'b>(
        &'a self,
        package: &'b str,
        activity: Option<&'b str>,
    ) -> impl Iterator<Item = &'a Rule> + use<'a, 'b> {
        self.rules
            .iter()
            .filter(move |r| r.applies_to(package, activity))
    }
}
