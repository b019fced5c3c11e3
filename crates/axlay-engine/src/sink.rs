//! Outbound delivery of `WindowEvent`s.
//!
//! Events are queued and delivered in order by a single flush task. When the sink
//! refuses an event, the flusher waits one retry interval and tries again until it
//! succeeds or the dispatcher is shut down.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axlay_protocol::WindowEvent;
use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// Consumer of distilled window events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. An error means "try again later".
    async fn send(&self, event: &WindowEvent) -> Result<()>;
}

/// Sink forwarding events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<WindowEvent>,
}

impl ChannelSink {
    /// Sink plus the receiving end of its channel.
    pub fn new() -> (Self, UnboundedReceiver<WindowEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, event: &WindowEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| Error::ServiceUnavailable("event receiver closed".into()))
    }
}

/// State shared between the dispatcher and its flush task.
struct Shared {
    sink: Arc<dyn EventSink>,
    pending: Mutex<VecDeque<WindowEvent>>,
    flushing: AtomicBool,
    retry_every: Duration,
    shutdown: CancellationToken,
}

/// Non-blocking front door for event delivery.
///
/// `emit` only enqueues; delivery happens on the runtime captured at construction.
pub struct EventDispatcher {
    shared: Arc<Shared>,
    handle: Handle,
}

impl EventDispatcher {
    /// Dispatcher delivering to `sink` on `handle`, retrying every `retry_every`.
    pub fn new(sink: Arc<dyn EventSink>, retry_every: Duration, handle: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                sink,
                pending: Mutex::new(VecDeque::new()),
                flushing: AtomicBool::new(false),
                retry_every,
                shutdown: CancellationToken::new(),
            }),
            handle,
        }
    }

    /// Queue `event` for delivery. Never blocks.
    pub fn emit(&self, event: WindowEvent) {
        if self.shared.shutdown.is_cancelled() {
            trace!(kind = ?event.kind, "dispatcher shut down; dropping event");
            return;
        }
        self.shared.pending.lock().push_back(event);
        if !self.shared.flushing.swap(true, Ordering::SeqCst) {
            let shared = self.shared.clone();
            self.handle.spawn(flush(shared));
        }
    }

    /// Events queued but not yet delivered.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Stop retrying and drop undelivered events.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let dropped = {
            let mut q = self.shared.pending.lock();
            let n = q.len();
            q.clear();
            n
        };
        if dropped > 0 {
            debug!(dropped, "undelivered events discarded");
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

/// Drain the queue front to back, holding each event until the sink accepts it.
async fn flush(shared: Arc<Shared>) {
    loop {
        let next = {
            let q = shared.pending.lock();
            match q.front() {
                Some(ev) => ev.clone(),
                None => {
                    // Cleared under the lock so a concurrent emit either lands in the
                    // queue before this check or sees the flag down and respawns.
                    shared.flushing.store(false, Ordering::SeqCst);
                    return;
                }
            }
        };
        match shared.sink.send(&next).await {
            Ok(()) => {
                shared.pending.lock().pop_front();
                trace!(kind = ?next.kind, "event delivered");
            }
            Err(e) => {
                warn!(error = %e, queued = shared.pending.lock().len(), "event sink unavailable; retrying");
                tokio::select! {
                    _ = sleep(shared.retry_every) => {}
                    _ = shared.shutdown.cancelled() => {
                        shared.flushing.store(false, Ordering::SeqCst);
                        return;
                    }
                }
            }
        }
        if shared.shutdown.is_cancelled() {
            shared.flushing.store(false, Ordering::SeqCst);
            return;
        }
    }
}
