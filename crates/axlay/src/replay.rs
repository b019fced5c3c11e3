use std::{path::Path, sync::Arc};

use axlay_engine::{ChannelSink, Detector, RawEvent, RawEventKind, RecordingSurface};
use axlay_protocol::{WindowEvent, relative_activity_name};
use axlay_tree::{StaticTree, Tree};
use config::{Config, load_from_path, resolve_config_path};
use serde_json::json;
use tokio::runtime::Builder;
use tracing::{debug, info};

use crate::error::CliError;

/// Run one detection cycle over the dump at `tree_path` and print the outcome as JSON.
pub fn run(
    tree_path: &Path,
    config_path: Option<&Path>,
    package: Option<String>,
    activity: Option<String>,
) -> Result<(), CliError> {
    let cfg = load_config(config_path)?;
    let provider = Arc::new(StaticTree::from_path(tree_path)?);
    let package = package.or_else(|| {
        Tree::new(provider.clone())
            .root()
            .and_then(|root| root.package_name().map(str::to_string))
    });
    info!(?package, ?activity, rules = cfg.rules.len(), "replaying window");

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(async move {
        let surface = Arc::new(RecordingSurface::new());
        let (sink, _events) = ChannelSink::new();
        let detector = Detector::new(provider, surface.clone(), Arc::new(sink), cfg)?;
        detector.start_detection();

        let raw = RawEvent {
            kind: RawEventKind::WindowStateChanged,
            package_name: package.clone(),
            class_name: activity.clone(),
            change_types: 0,
        };
        let event = detector.on_raw_event(&raw).unwrap_or_else(|| {
            debug!("observer produced no event; using the raw window");
            raw_window_event(package, activity)
        });
        let report = detector.run_rules(&event).await;
        let output = json!({
            "event": event,
            "report": report,
            "overlay_ops": surface.ops(),
            "snapshot": detector.latest_snapshot().as_deref(),
        });
        detector.shutdown();
        Ok::<_, CliError>(output)
    })?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Window event for the simulated window, with the activity made package-relative.
fn raw_window_event(package: Option<String>, activity: Option<String>) -> WindowEvent {
    let activity = match (&package, activity) {
        (Some(pkg), Some(full)) => Some(relative_activity_name(&full, pkg)),
        (_, activity) => activity,
    };
    WindowEvent::state_changed(package, activity)
}

/// Explicit config, else the default file when present, else built-in defaults.
fn load_config(explicit: Option<&Path>) -> Result<Config, CliError> {
    if let Some(path) = explicit {
        return Ok(load_from_path(path)?);
    }
    match resolve_config_path(None) {
        Ok(path) => Ok(load_from_path(&path)?),
        Err(e) => {
            debug!(error = %e, "no config; running without rules");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_window_event_uses_relative_activity() {
        let ev = raw_window_event(
            Some("com.example.shop".into()),
            Some("com.example.shop.CheckoutActivity".into()),
        );
        assert_eq!(ev.relative_activity_name.as_deref(), Some(".CheckoutActivity"));
        assert_eq!(ev.package_name.as_deref(), Some("com.example.shop"));

        let ev = raw_window_event(None, Some("com.other.Main".into()));
        assert_eq!(ev.relative_activity_name.as_deref(), Some("com.other.Main"));
    }
}
