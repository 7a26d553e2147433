//! Session manager for OBD streaming

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cabin_core::{BridgeEvent, EventSink};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SessionState;
use crate::config::{FramingConfig, ObdConfig};
use crate::discovery::{Discovery, DiscoverySource};
use crate::error::ObdError;
use crate::framer::LineReader;
use crate::transport::{Transport, TransportKind};

/// Snapshot of the manager for status queries
#[derive(Debug, Clone, Serialize)]
pub struct ObdStatus {
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Lines posted in the current session
    pub lines: u64,
}

struct ActiveStream {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    transport: Arc<dyn Transport>,
    source: DiscoverySource,
    running: Arc<AtomicBool>,
    lines: Arc<AtomicU64>,
    worker: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    active: Option<ActiveStream>,
    /// Bumped by every stop(); a start() that finishes connecting under an
    /// older generation was cancelled
    generation: u64,
}

/// Manages the OBD transport and its read worker
///
/// At most one transport is open per manager. `start` while a stream is
/// connecting or streaming is rejected with [`ObdError::Busy`]; a stream
/// that ended on its own does not block a new `start`.
pub struct ObdSessionManager {
    discovery: Discovery,
    sink: Arc<dyn EventSink>,
    framing: FramingConfig,
    join_timeout: Duration,
    inner: Mutex<Inner>,
}

impl ObdSessionManager {
    pub fn new(discovery: Discovery, sink: Arc<dyn EventSink>, config: &ObdConfig) -> Self {
        Self {
            discovery,
            sink,
            framing: config.framing.clone(),
            join_timeout: config.stop_join_timeout(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Discover a transport and start streaming lines
    ///
    /// Returns the new session id. On failure nothing changes.
    pub async fn start(&self, target_hint: &str) -> Result<Uuid, ObdError> {
        let generation = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Connecting => return Err(ObdError::Busy("connecting")),
                SessionState::Streaming => {
                    let alive = inner
                        .active
                        .as_ref()
                        .is_some_and(|a| a.running.load(Ordering::SeqCst));
                    if alive {
                        return Err(ObdError::Busy("streaming"));
                    }
                    // Previous worker ended on its own (EOF or I/O error)
                    if let Some(stale) = inner.active.take() {
                        stale.transport.close();
                        debug!(session_id = %stale.session_id, "Reaped finished OBD session");
                    }
                }
                SessionState::Idle => {}
            }
            inner.state = SessionState::Connecting;
            inner.generation
        };

        let discovery = self.discovery.clone();
        let hint = target_hint.to_string();
        let discovered = tokio::task::spawn_blocking(move || discovery.discover(&hint))
            .await
            .map_err(|e| ObdError::Worker(format!("discovery task failed: {}", e)))
            .and_then(|result| result);

        let discovered = match discovered {
            Ok(d) => d,
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.generation == generation {
                    inner.state = SessionState::Idle;
                }
                debug!(target_hint, error = %e, "OBD start failed");
                return Err(e);
            }
        };

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            discovered.transport.close();
            return Err(ObdError::Cancelled);
        }

        let session_id = Uuid::new_v4();
        let running = Arc::new(AtomicBool::new(true));
        let lines = Arc::new(AtomicU64::new(0));
        let worker = spawn_read_worker(
            session_id,
            discovered.transport.clone(),
            self.framing.clone(),
            running.clone(),
            lines.clone(),
            self.sink.clone(),
        );

        info!(
            %session_id,
            transport = %discovered.transport.describe(),
            kind = %discovered.transport.kind(),
            source = ?discovered.source,
            "OBD stream started"
        );

        inner.active = Some(ActiveStream {
            session_id,
            started_at: Utc::now(),
            transport: discovered.transport,
            source: discovered.source,
            running,
            lines,
            worker,
        });
        inner.state = SessionState::Streaming;

        Ok(session_id)
    }

    /// Stop streaming
    ///
    /// Clears the running flag, closes the transport (which unblocks a
    /// pending read) and waits a bounded time for the worker. A worker that
    /// does not exit in time is abandoned. Safe to call at any time, any
    /// number of times.
    pub async fn stop(&self) {
        let active = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = SessionState::Idle;
            inner.active.take()
        };

        let Some(active) = active else {
            debug!("OBD stop requested with no active stream");
            return;
        };

        active.running.store(false, Ordering::SeqCst);
        active.transport.close();

        match tokio::time::timeout(self.join_timeout, active.worker).await {
            Ok(Ok(())) => {
                info!(session_id = %active.session_id, "OBD stream stopped");
            }
            Ok(Err(e)) => {
                warn!(session_id = %active.session_id, error = %e, "OBD worker panicked");
            }
            Err(_) => {
                warn!(
                    session_id = %active.session_id,
                    timeout_ms = self.join_timeout.as_millis() as u64,
                    "OBD worker did not exit in time, abandoning"
                );
            }
        }
    }

    /// Whether the read worker is still streaming
    ///
    /// Reflects the running flag, which the worker clears when it exits.
    pub fn is_running(&self) -> bool {
        self.inner
            .lock()
            .active
            .as_ref()
            .is_some_and(|a| a.running.load(Ordering::SeqCst))
    }

    pub fn state(&self) -> SessionState {
        let inner = self.inner.lock();
        match inner.state {
            SessionState::Streaming
                if !inner
                    .active
                    .as_ref()
                    .is_some_and(|a| a.running.load(Ordering::SeqCst)) =>
            {
                SessionState::Idle
            }
            state => state,
        }
    }

    pub fn status(&self) -> ObdStatus {
        let state = self.state();
        let inner = self.inner.lock();
        match inner.active.as_ref() {
            Some(active) if state == SessionState::Streaming => ObdStatus {
                state,
                session_id: Some(active.session_id),
                transport: Some(format!(
                    "{}:{}",
                    active.transport.kind(),
                    active.transport.describe()
                )),
                started_at: Some(active.started_at),
                lines: active.lines.load(Ordering::Relaxed),
            },
            _ => ObdStatus {
                state,
                session_id: None,
                transport: None,
                started_at: None,
                lines: 0,
            },
        }
    }

    /// Kind of the open transport, if streaming
    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.inner
            .lock()
            .active
            .as_ref()
            .map(|a| a.transport.kind())
    }

    /// Which discovery rule selected the current transport
    pub fn source(&self) -> Option<DiscoverySource> {
        self.inner.lock().active.as_ref().map(|a| a.source.clone())
    }
}

impl Drop for ObdSessionManager {
    fn drop(&mut self) {
        if let Some(active) = self.inner.get_mut().active.take() {
            active.running.store(false, Ordering::SeqCst);
            active.transport.close();
        }
    }
}

fn spawn_read_worker(
    session_id: Uuid,
    transport: Arc<dyn Transport>,
    framing: FramingConfig,
    running: Arc<AtomicBool>,
    lines: Arc<AtomicU64>,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let reader = LineReader::new(transport.clone(), &framing).with_stop_flag(running.clone());
        for item in reader {
            match item {
                Ok(line) => {
                    sink.post(BridgeEvent::ObdData(line));
                    lines.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    // No error event reaches the UI; the stream just ends
                    warn!(%session_id, error = %e, "OBD stream failed");
                    break;
                }
            }
        }

        transport.close();
        running.store(false, Ordering::SeqCst);
        debug!(%session_id, lines = lines.load(Ordering::Relaxed), "OBD read worker exited");
    })
}
