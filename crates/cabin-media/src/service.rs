//! Media service: pull refresh with cache fallback

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::cache::MediaCache;
use crate::error::MediaError;
use crate::registry::SessionRegistry;
use crate::selection::select_session;
use crate::snapshot::MediaSnapshot;

/// Owns the cache and answers "what is playing now"
///
/// Shared by the pull path (`current`) and the push path
/// ([`MediaWatcher`](crate::MediaWatcher)); both write through
/// [`refresh_from_registry`](Self::refresh_from_registry).
pub struct MediaService {
    registry: Arc<dyn SessionRegistry>,
    cache: MediaCache,
}

impl MediaService {
    pub fn new(registry: Arc<dyn SessionRegistry>, cache: MediaCache) -> Self {
        Self { registry, cache }
    }

    pub fn registry(&self) -> &Arc<dyn SessionRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    pub fn has_access(&self) -> bool {
        self.registry.has_access()
    }

    /// Query the registry, select a session and cache its snapshot
    pub fn refresh_from_registry(&self) -> Result<MediaSnapshot, MediaError> {
        self.refresh_at(Instant::now())
    }

    fn refresh_at(&self, now: Instant) -> Result<MediaSnapshot, MediaError> {
        let sessions = self.registry.active_sessions()?;
        let session = select_session(&sessions).ok_or(MediaError::NoSessions)?;
        let snapshot =
            MediaSnapshot::from_session(session).ok_or_else(|| MediaError::NoMetadata {
                package: session.package_name.clone().unwrap_or_default(),
            })?;

        trace!(
            package = ?snapshot.package_name,
            state = ?snapshot.state,
            candidates = sessions.len(),
            "Media snapshot refreshed"
        );
        self.cache.store_at(snapshot.clone(), now);
        Ok(snapshot)
    }

    /// Live snapshot, falling back to a fresh cached one
    pub fn current(&self) -> Result<MediaSnapshot, MediaError> {
        self.current_at(Instant::now())
    }

    /// [`current`](Self::current) as of `now`
    pub fn current_at(&self, now: Instant) -> Result<MediaSnapshot, MediaError> {
        match self.refresh_at(now) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                debug!(error = %e, "Live media refresh failed, using cache");
                self.cache.fresh_at(now)
            }
        }
    }

    /// Current snapshot as JSON, `"{}"` when there is nothing to report
    pub fn current_json(&self) -> String {
        self.current()
            .map(|s| s.to_json())
            .unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use crate::session::{MediaSession, Metadata, PlaybackState};
    use std::time::Duration;

    fn playing(title: &str) -> MediaSession {
        MediaSession::new("com.spotify.music")
            .with_playback(PlaybackState::Playing, 1)
            .with_metadata(Metadata {
                title: Some(title.into()),
                ..Metadata::default()
            })
    }

    fn service() -> (MediaService, Arc<InMemoryRegistry>) {
        let registry = Arc::new(InMemoryRegistry::new());
        let service = MediaService::new(registry.clone(), MediaCache::new(Duration::from_secs(30)));
        (service, registry)
    }

    #[test]
    fn test_live_refresh_writes_cache() {
        let (service, registry) = service();
        registry.set_sessions(vec![playing("Live")]);

        let snapshot = service.current().unwrap();
        assert_eq!(snapshot.title.as_deref(), Some("Live"));
        assert_eq!(
            service.cache().fresh().unwrap().title.as_deref(),
            Some("Live")
        );
    }

    #[test]
    fn test_falls_back_to_cache_then_expires() {
        let (service, registry) = service();
        let t0 = Instant::now();
        registry.set_sessions(vec![playing("Cached")]);
        service.current_at(t0).unwrap();

        registry.set_sessions(vec![]);
        let read = service.current_at(t0 + Duration::from_millis(29_900)).unwrap();
        assert_eq!(read.title.as_deref(), Some("Cached"));
        assert!(matches!(
            service.current_at(t0 + Duration::from_millis(30_100)),
            Err(MediaError::Stale)
        ));
    }

    #[test]
    fn test_selected_session_without_metadata_uses_cache() {
        let (service, registry) = service();
        registry.set_sessions(vec![playing("Before")]);
        service.refresh_from_registry().unwrap();

        registry.set_sessions(vec![
            MediaSession::new("com.radio").with_playback(PlaybackState::Playing, 5),
        ]);
        assert!(matches!(
            service.refresh_from_registry(),
            Err(MediaError::NoMetadata { .. })
        ));
        assert_eq!(service.current().unwrap().title.as_deref(), Some("Before"));
    }

    #[test]
    fn test_empty_json_when_nothing_known() {
        let (service, registry) = service();
        assert_eq!(service.current_json(), "{}");

        registry.set_available(false);
        assert_eq!(service.current_json(), "{}");
    }
}
