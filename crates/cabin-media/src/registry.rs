//! Session registry seam
//!
//! The platform facility that tracks active media sessions. The bridge
//! only queries it and listens for change notifications.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::MediaError;
use crate::session::MediaSession;

/// Change notifications from the registry and the notification listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// The set of active sessions changed
    SessionsChanged,
    /// A notification was posted by `package`
    NotificationPosted { package: String },
    /// A notification of `package` was dismissed
    NotificationRemoved { package: String },
    /// The notification listener (re)connected
    ListenerConnected,
}

impl RegistryEvent {
    /// Package the event is about, for notification events
    pub fn package(&self) -> Option<&str> {
        match self {
            RegistryEvent::NotificationPosted { package }
            | RegistryEvent::NotificationRemoved { package } => Some(package),
            _ => None,
        }
    }
}

pub trait SessionRegistry: Send + Sync {
    /// Whether the bridge was granted access to media sessions
    fn has_access(&self) -> bool;

    /// Active sessions in registry order
    fn active_sessions(&self) -> Result<Vec<MediaSession>, MediaError>;

    fn subscribe(&self) -> broadcast::Receiver<RegistryEvent>;
}

/// Registry held in memory and fed by its owner
///
/// Used by the daemon (sessions pushed over its command channel) and by
/// tests.
pub struct InMemoryRegistry {
    sessions: RwLock<Vec<MediaSession>>,
    access: AtomicBool,
    available: AtomicBool,
    events: broadcast::Sender<RegistryEvent>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            sessions: RwLock::new(Vec::new()),
            access: AtomicBool::new(true),
            available: AtomicBool::new(true),
            events,
        }
    }

    /// Replace the session list and announce the change
    pub fn set_sessions(&self, sessions: Vec<MediaSession>) {
        debug!(count = sessions.len(), "Active media sessions replaced");
        *self.sessions.write() = sessions;
        self.notify(RegistryEvent::SessionsChanged);
    }

    pub fn set_access(&self, granted: bool) {
        self.access.store(granted, Ordering::SeqCst);
    }

    /// Make queries fail as if the platform service were gone
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn notify(&self, event: RegistryEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl SessionRegistry for InMemoryRegistry {
    fn has_access(&self) -> bool {
        self.access.load(Ordering::SeqCst)
    }

    fn active_sessions(&self) -> Result<Vec<MediaSession>, MediaError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(MediaError::Unavailable("session service not running".into()));
        }
        if !self.has_access() {
            return Err(MediaError::AccessDenied);
        }
        Ok(self.sessions.read().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }
}
