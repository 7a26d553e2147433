//! Staleness-bounded snapshot cache
//!
//! Last writer wins. The snapshot and its timestamp live under one lock so
//! a reader never sees a new snapshot with an old timestamp or the reverse.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::trace;

use crate::error::MediaError;
use crate::snapshot::MediaSnapshot;

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: MediaSnapshot,
    updated_at: Instant,
    updated_wall: DateTime<Utc>,
}

/// Process-wide cache of the last known snapshot
#[derive(Debug)]
pub struct MediaCache {
    entry: Mutex<Option<CacheEntry>>,
    staleness: Duration,
}

impl MediaCache {
    pub fn new(staleness: Duration) -> Self {
        Self {
            entry: Mutex::new(None),
            staleness,
        }
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    pub fn store(&self, snapshot: MediaSnapshot) {
        self.store_at(snapshot, Instant::now());
    }

    /// Overwrite the cached snapshot as of `now`
    pub fn store_at(&self, snapshot: MediaSnapshot, now: Instant) {
        *self.entry.lock() = Some(CacheEntry {
            snapshot,
            updated_at: now,
            updated_wall: Utc::now(),
        });
        trace!("Media cache updated");
    }

    pub fn fresh(&self) -> Result<MediaSnapshot, MediaError> {
        self.fresh_at(Instant::now())
    }

    /// The cached snapshot if it is younger than the staleness window
    ///
    /// Never-written and expired both report [`MediaError::Stale`].
    pub fn fresh_at(&self, now: Instant) -> Result<MediaSnapshot, MediaError> {
        let entry = self.entry.lock();
        match entry.as_ref() {
            Some(e) if now.saturating_duration_since(e.updated_at) < self.staleness => {
                Ok(e.snapshot.clone())
            }
            _ => Err(MediaError::Stale),
        }
    }

    /// Wall-clock time of the last write
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.entry.lock().as_ref().map(|e| e.updated_wall)
    }

    pub fn clear(&self) {
        *self.entry.lock() = None;
    }
}
