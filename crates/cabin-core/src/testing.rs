//! In-memory sinks for tests
//!
//! Used by the unit and integration tests of every bridge crate to
//! observe what would have reached the UI surface.

use std::time::Duration;

use parking_lot::Mutex;

use crate::dispatch::UiSurface;
use crate::event::{BridgeEvent, EventSink};

/// Event sink that records every posted event
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BridgeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BridgeEvent> {
        self.events.lock().clone()
    }

    /// OBD lines only, in delivery order
    pub fn obd_lines(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::ObdData(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Progress values only, in delivery order
    pub fn progress(&self) -> Vec<u8> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::DownloadProgress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` events were posted or the timeout elapsed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<BridgeEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let events = self.events();
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl EventSink for RecordingSink {
    fn post(&self, event: BridgeEvent) {
        self.events.lock().push(event);
    }
}

/// UI surface that records evaluated scripts
#[derive(Debug, Default)]
pub struct RecordingSurface {
    scripts: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    /// Wait until at least `count` scripts were evaluated or the timeout elapsed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let scripts = self.scripts();
            if scripts.len() >= count || tokio::time::Instant::now() >= deadline {
                return scripts;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Blocking variant for callers outside the runtime
    pub fn wait_for_blocking(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let scripts = self.scripts();
            if scripts.len() >= count || std::time::Instant::now() >= deadline {
                return scripts;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl UiSurface for RecordingSurface {
    fn evaluate(&self, script: &str) {
        self.scripts.lock().push(script.to_string());
    }
}
