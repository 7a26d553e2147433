//! Push path: refresh the cache on registry notifications

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::registry::RegistryEvent;
use crate::service::MediaService;

/// Whether a package name looks like a media app
pub fn is_media_app(package: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| !k.is_empty() && package.contains(k.as_str()))
}

/// Background task that keeps the cache warm
///
/// Session changes and listener (re)connects always refresh; notification
/// events refresh only for media apps.
pub struct MediaWatcher {
    handle: JoinHandle<()>,
}

impl MediaWatcher {
    /// Subscribe to the service's registry and spawn the watch loop on the
    /// current runtime
    pub fn spawn(service: Arc<MediaService>, keywords: Vec<String>) -> Self {
        let mut events = service.registry().subscribe();

        let handle = tokio::spawn(async move {
            info!("Media watcher started");
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Media watcher lagged, refreshing");
                        RegistryEvent::SessionsChanged
                    }
                    Err(RecvError::Closed) => break,
                };

                if let Some(package) = event.package() {
                    if !is_media_app(package, &keywords) {
                        trace!(package, "Ignoring non-media notification");
                        continue;
                    }
                }

                match service.refresh_from_registry() {
                    Ok(snapshot) => {
                        debug!(event = ?event, package = ?snapshot.package_name, "Media cache refreshed")
                    }
                    Err(e) => trace!(event = ?event, error = %e, "Media refresh skipped"),
                }
            }
            debug!("Media watcher stopped");
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for MediaWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_app_keywords() {
        let keywords: Vec<String> = vec!["music".into(), "spotify".into()];
        assert!(is_media_app("com.spotify.client", &keywords));
        assert!(is_media_app("com.apple.android.music", &keywords));
        assert!(!is_media_app("com.whatsapp", &keywords));
        assert!(!is_media_app("com.whatsapp", &[String::new()]));
    }
}
