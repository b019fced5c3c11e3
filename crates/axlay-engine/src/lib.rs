//! axlay engine
//!
//! The engine turns a live accessibility tree into overlay placements:
//! - distills raw platform notifications into deduplicated window events
//! - evaluates rule allow/deny selector lists with a short-lived cache
//! - locates elements only once their bounds hold still across two polls
//! - runs each cycle's locates as one cancellable batch, superseded by any new event
//! - gates overlay mutation on a process-wide draw permission
//! - keeps a bounded history of tree snapshots
//!
//! [`Detector`] is the type you construct and drive. The component types are public
//! so hosts can assemble a different pipeline, and so tests can drive them directly.

mod batch;
mod condition;
mod error;
mod gate;
mod locator;
mod observer;
mod overlay;
mod selector;
mod service;
mod sink;
mod snapshot;
pub mod test_support;

pub use batch::{BatchOutcome, BatchQueryCoordinator};
pub use condition::ConditionEvaluator;
pub use error::{Error, Result};
pub use gate::{DrawGate, RuleMatchState};
pub use locator::{LocatePhase, Probe, StabilityLocator};
pub use observer::{Denylist, RawEvent, RawEventKind, ShellFilter, TreeObserver};
pub use overlay::{OverlayOp, OverlayRegistry, OverlaySurface, RecordingSurface};
pub use selector::{exists, find, find_all, resolve_instance};
pub use service::{CycleReport, Detector};
pub use sink::{ChannelSink, EventDispatcher, EventSink};
pub use snapshot::{StateSnapshotStore, TextOverrides, capture};
