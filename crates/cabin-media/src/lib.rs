//! cabin-media - Now-playing information for the cabin bridge
//!
//! Selects one session out of the platform's active media sessions,
//! turns it into a [`MediaSnapshot`] and keeps the last snapshot in a
//! cache that expires after a staleness window.
//!
//! Two paths write the cache:
//! - pull: [`MediaService::current`] refreshes live and falls back to the
//!   cache only when the live refresh fails
//! - push: [`MediaWatcher`] refreshes on registry notifications

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod selection;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod watcher;

pub use cache::MediaCache;
pub use config::MediaConfig;
pub use error::MediaError;
pub use registry::{InMemoryRegistry, RegistryEvent, SessionRegistry};
pub use selection::select_session;
pub use service::MediaService;
pub use session::{MediaSession, Metadata, Playback, PlaybackState};
pub use snapshot::MediaSnapshot;
pub use watcher::{is_media_app, MediaWatcher};
