use std::{sync::Arc, time::Duration};

use axlay_engine::{
    ChannelSink, Detector, OverlayOp, RawEvent, RecordingSurface, test_support::fast_detection,
};
use axlay_protocol::{MSG_CANCELLED, WindowEvent, WindowEventKind};
use axlay_tree::{NodeSpec, StaticTree};
use config::{Config, Format, load_from_str};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{sleep, timeout},
};
use tracing_subscriber::EnvFilter;

const PKG: &str = "com.example.shop";
const ACTIVITY: &str = "com.example.shop.CheckoutActivity";

const RULES: &str = r##"(
    rules: [
        (
            name: "checkout",
            package_name: "com.example.shop",
            activity_name: Some(".CheckoutActivity"),
            allow: [".text(\"Total\")"],
            deny: [".text(\"Payment failed\")"],
            overlays: [
                (
                    selector: ".resourceId(\"com.example.shop:id/price\")",
                    overlay: (text: "Price: 0", text_color: "#FFFF0000"),
                ),
            ],
        ),
    ],
)"##;

fn checkout(extra: Option<&str>) -> NodeSpec {
    let mut root = NodeSpec::new("android.widget.FrameLayout")
        .package(PKG)
        .bounds(0, 0, 1080, 2400)
        .children([
            NodeSpec::new("android.widget.TextView")
                .package(PKG)
                .text("Total")
                .bounds(40, 300, 400, 360),
            NodeSpec::new("android.widget.TextView")
                .package(PKG)
                .resource_id("com.example.shop:id/price")
                .text("Price: 10")
                .bounds(600, 300, 1040, 360),
        ]);
    if let Some(text) = extra {
        root = root.child(NodeSpec::new("android.widget.TextView").package(PKG).text(text));
    }
    root
}

fn config(mutate: impl FnOnce(&mut Config)) -> Config {
    let mut cfg = load_from_str(RULES, Format::Ron).unwrap();
    cfg.detection = fast_detection();
    mutate(&mut cfg);
    cfg
}

struct Harness {
    provider: Arc<StaticTree>,
    surface: Arc<RecordingSurface>,
    events: UnboundedReceiver<WindowEvent>,
    detector: Arc<Detector>,
}

/// Route engine logs to the test writer; `RUST_LOG=axlay_engine=trace` to see them.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

fn harness(spec: &NodeSpec, cfg: Config) -> Harness {
    init_logging();
    let provider = Arc::new(StaticTree::new(spec));
    let surface = Arc::new(RecordingSurface::new());
    let (sink, events) = ChannelSink::new();
    let detector =
        Detector::new(provider.clone(), surface.clone(), Arc::new(sink), cfg).unwrap();
    Harness {
        provider,
        surface,
        events,
        detector: Arc::new(detector),
    }
}

async fn next_event(rx: &mut UnboundedReceiver<WindowEvent>) -> WindowEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event delivered")
        .expect("channel open")
}

#[tokio::test(flavor = "multi_thread")]
async fn window_event_drives_a_full_cycle() {
    let mut h = harness(&checkout(None), config(|_| {}));
    h.detector.start_detection();

    let ev = h
        .detector
        .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
        .unwrap();
    assert_eq!(ev.relative_activity_name.as_deref(), Some(".CheckoutActivity"));
    let delivered = next_event(&mut h.events).await;
    assert_eq!(delivered.kind, WindowEventKind::WindowStateChanged);

    let report = h.detector.run_rules(&ev).await;
    assert_eq!(report.rule.as_deref(), Some("checkout"));
    assert_eq!(report.drawn, 1);
    assert!(!report.cancelled);
    let res = &report.results[0];
    assert!(res.success);
    assert_eq!(res.coordinates.unwrap().x, 600);
    assert_eq!(res.size.unwrap().width, 440);

    let shown = h.detector.overlays().get("checkout#0").unwrap();
    assert_eq!((shown.x, shown.y, shown.height), (600.0, 300.0, 60.0));
    assert_eq!(shown.text, "Price: 0");
    assert!(matches!(&h.surface.ops()[..], [OverlayOp::Create { id, .. }] if id == "checkout#0"));

    let snap = h.detector.latest_snapshot().unwrap();
    let price = snap
        .root
        .iter()
        .find(|n| n.resource_id.as_deref() == Some("com.example.shop:id/price"))
        .unwrap();
    assert_eq!(price.text.as_deref(), Some("Price: 0"));
    assert_eq!(h.provider.outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn deny_condition_blocks_the_rule() {
    let h = harness(&checkout(Some("Payment failed")), config(|_| {}));
    h.detector.start_detection();
    let ev = h
        .detector
        .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
        .unwrap();
    let report = h.detector.run_rules(&ev).await;
    assert!(report.rule.is_none());
    assert!(report.results.is_empty());
    assert!(!h.detector.is_rule_matched());
    assert!(h.detector.overlays().is_empty());
    assert!(h.detector.latest_snapshot().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn new_window_event_cancels_the_running_batch() {
    let cfg = config(|c| {
        c.detection.max_retries = 200;
        c.detection.poll_interval_ms = 20;
        c.rules[0].overlays[0].selector = ".text(\"Coupon\")".parse().unwrap();
    });
    let h = harness(&checkout(None), cfg);
    h.detector.start_detection();
    let ev = h
        .detector
        .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
        .unwrap();

    let detector = h.detector.clone();
    let cycle = tokio::spawn(async move { detector.run_rules(&ev).await });
    timeout(Duration::from_secs(2), async {
        while !h.detector.is_drawing_allowed() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    h.provider.replace(&checkout(Some("Address changed")));
    assert!(
        h.detector
            .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
            .is_some()
    );
    assert!(!h.detector.is_drawing_allowed());

    let report = timeout(Duration::from_secs(1), cycle).await.unwrap().unwrap();
    assert!(report.cancelled);
    assert_eq!(report.results[0].message.as_deref(), Some(MSG_CANCELLED));
    assert_eq!(report.drawn, 0);
    assert!(h.detector.latest_snapshot().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn superseded_cycle_leaves_overlays_alone() {
    let cfg = config(|c| {
        c.detection.max_retries = 200;
        c.detection.poll_interval_ms = 20;
    });
    let h = harness(&checkout(None), cfg);
    h.detector.start_detection();
    let ev = h
        .detector
        .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
        .unwrap();
    assert_eq!(h.detector.run_rules(&ev).await.drawn, 1);
    h.detector.cancel_search();

    // Same screen with the price gone: the next locate keeps polling.
    h.provider.replace(
        &NodeSpec::new("android.widget.FrameLayout")
            .package(PKG)
            .bounds(0, 0, 1080, 2400)
            .child(
                NodeSpec::new("android.widget.TextView")
                    .package(PKG)
                    .text("Total")
                    .bounds(40, 300, 400, 360),
            ),
    );
    let detector = h.detector.clone();
    let cycle = tokio::spawn(async move { detector.run_rules(&ev).await });
    timeout(Duration::from_secs(2), async {
        while !h.detector.is_drawing_allowed() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    assert!(
        h.detector
            .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
            .is_some()
    );

    let report = timeout(Duration::from_secs(1), cycle).await.unwrap().unwrap();
    assert!(report.cancelled);
    assert_eq!(report.drawn, 0);
    assert_eq!(h.detector.overlays().ids(), ["checkout#0"]);
    assert!(matches!(&h.surface.ops()[..], [OverlayOp::Create { .. }]));
}

#[tokio::test(flavor = "multi_thread")]
async fn service_lifecycle() {
    let mut h = harness(&checkout(None), config(|_| {}));

    assert!(h.detector.on_service_connected());
    let ev = next_event(&mut h.events).await;
    assert_eq!(ev.kind, WindowEventKind::ServiceConnected);
    assert!(ev.first_connect);
    assert!(!h.detector.is_detecting());
    assert!(
        h.detector
            .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
            .is_none()
    );

    h.detector.start_detection();
    let ev = h
        .detector
        .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
        .unwrap();
    h.detector.run_rules(&ev).await;
    assert_eq!(h.detector.overlays().len(), 1);

    h.detector.stop_detection();
    assert!(!h.detector.is_detecting());
    assert!(!h.detector.is_rule_matched());
    assert!(!h.detector.is_drawing_allowed());
    assert!(h.detector.overlays().is_empty());
    assert_eq!(h.surface.ops().last(), Some(&OverlayOp::RemoveAll));

    assert!(!h.detector.on_service_connected());
    assert!(h.detector.is_detecting());
    // The observer state was reset, so the same window is new again.
    assert!(
        h.detector
            .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
            .is_some()
    );
    h.detector.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn rule_match_drop_clears_overlays() {
    let h = harness(&checkout(None), config(|_| {}));
    h.detector.start_detection();
    let ev = h
        .detector
        .on_raw_event(&RawEvent::state_changed(PKG, ACTIVITY))
        .unwrap();
    h.detector.run_rules(&ev).await;
    assert!(!h.detector.overlays().is_empty());

    h.detector.update_rule_match_status(false);
    assert!(h.detector.overlays().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn find_element_picks_last_login() {
    let spec = NodeSpec::new("android.widget.LinearLayout").children([
        NodeSpec::new("android.widget.Button")
            .text("Login")
            .bounds(0, 100, 200, 150),
        NodeSpec::new("android.widget.Button")
            .text("Login")
            .bounds(0, 400, 200, 450),
    ]);
    let h = harness(&spec, config(|_| {}));

    let res = h.detector.find_element(r#".text("Login").instance(-1)"#).await;
    assert!(res.success);
    assert_eq!(res.coordinates.unwrap().y, 400);

    let res = h.detector.find_element(".bogus(\"x\")").await;
    assert!(!res.success);
    assert!(res.message.unwrap().starts_with("Invalid selector"));
}
