//! Which session is "now playing"

use crate::session::MediaSession;

/// Pick the session to report
///
/// 1. The first playing or buffering session, in registry order.
/// 2. Otherwise the session with the latest position update. Ties keep the
///    earlier session; a timestamp of 0 never wins.
/// 3. Otherwise the first session.
///
/// Sessions without playback information only take part in step 3.
pub fn select_session(sessions: &[MediaSession]) -> Option<&MediaSession> {
    let mut most_recent: Option<&MediaSession> = None;
    let mut latest = 0i64;

    for session in sessions {
        let Some(playback) = &session.playback else {
            continue;
        };
        if playback.state.is_active() {
            return Some(session);
        }
        if playback.last_position_update > latest {
            latest = playback.last_position_update;
            most_recent = Some(session);
        }
    }

    most_recent.or_else(|| sessions.first())
}
