//! UI-bound queue
//!
//! Every component posts its events into one [`UiQueue`]. A single
//! dispatcher task drains the queue and invokes the [`UiSurface`], so
//! callbacks are never run concurrently with each other and events from
//! the same producer arrive in production order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::event::{BridgeEvent, EventSink};

/// The script-driven view that receives callbacks
pub trait UiSurface: Send + Sync + 'static {
    /// Evaluate a script in the view. Fire-and-forget.
    fn evaluate(&self, script: &str);
}

/// Cloneable producer side of the UI-bound queue
#[derive(Debug, Clone)]
pub struct UiQueue {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl EventSink for UiQueue {
    fn post(&self, event: BridgeEvent) {
        if self.tx.send(event).is_err() {
            // Dispatcher is gone; events after shutdown are dropped
            trace!("UI queue closed, dropping event");
        }
    }
}

/// Single consumer of the UI-bound queue
pub struct UiDispatcher {
    queue: UiQueue,
    delivered: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl UiDispatcher {
    /// Spawn the dispatcher on the current runtime
    pub fn spawn(surface: Arc<dyn UiSurface>) -> Self {
        Self::spawn_on(&Handle::current(), surface)
    }

    /// Spawn the dispatcher on the given runtime
    pub fn spawn_on(runtime: &Handle, surface: Arc<dyn UiSurface>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<BridgeEvent>();
        let delivered = Arc::new(AtomicU64::new(0));
        let counter = delivered.clone();

        let handle = runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                surface.evaluate(&event.to_script());
                counter.fetch_add(1, Ordering::Relaxed);
            }
            debug!("UI dispatcher stopped");
        });

        Self {
            queue: UiQueue { tx },
            delivered,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Producer handle for components
    pub fn queue(&self) -> UiQueue {
        self.queue.clone()
    }

    /// Number of events handed to the surface so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Stop delivering. Events still queued are discarded.
    pub fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
            debug!("UI dispatcher shut down");
        }
    }
}

impl Drop for UiDispatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}
