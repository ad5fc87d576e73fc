/**
 * ============================================================================
 * SESSION LISTENER MODULE
 * ============================================================================
 *
 * PURPOSE: Receivers for completed-session events
 *
 * IMPLEMENTATIONS:
 * - Closures: any FnMut(CompletedSession)
 * - Channels: tokio mpsc senders, for async consumers (upload, archive)
 * - ManifestListener: writes the JSON manifest sidecar, then forwards
 *
 * Listeners run on the session worker. Anything slow (uploads) belongs on
 * the other side of a channel.
 *
 * ============================================================================
 */

use crate::session::storage;
use crate::session::types::CompletedSession;
use tokio::sync::mpsc;

pub trait SessionListener: Send {
    fn on_session_stop(&mut self, session: CompletedSession);
}

impl<F> SessionListener for F
where
    F: FnMut(CompletedSession) + Send,
{
    fn on_session_stop(&mut self, session: CompletedSession) {
        self(session)
    }
}

impl SessionListener for mpsc::UnboundedSender<CompletedSession> {
    fn on_session_stop(&mut self, session: CompletedSession) {
        let id = session.id;
        if self.send(session).is_err() {
            log::warn!("Session {} dropped: listener channel closed", id);
        }
    }
}

impl SessionListener for mpsc::Sender<CompletedSession> {
    fn on_session_stop(&mut self, session: CompletedSession) {
        let id = session.id;
        if let Err(e) = self.try_send(session) {
            log::error!("Session {} dropped: {}", id, e);
        }
    }
}

// Writes session.json into each session's cache directory before forwarding
pub struct ManifestListener<L> {
    inner: L,
}

impl<L: SessionListener> ManifestListener<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: SessionListener> SessionListener for ManifestListener<L> {
    fn on_session_stop(&mut self, session: CompletedSession) {
        if let Err(e) = storage::save_manifest(&session) {
            log::warn!("Failed to write manifest for session {}: {}", session.id, e);
        }
        self.inner.on_session_stop(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{SessionArtifacts, VideoClip};
    use chrono::Utc;
    use uuid::Uuid;

    fn session(dir: &std::path::Path) -> CompletedSession {
        CompletedSession {
            id: Uuid::new_v4(),
            artifacts: SessionArtifacts::new(
                vec![VideoClip { start_seconds: 0.0, end_seconds: 2.0 }],
                Vec::new(),
            ),
            video_path: dir.join("buffer_0.mp4"),
            cached_telemetry_dir: dir.to_path_buf(),
            core_session_start_millis: 1_000,
            started_at: Utc::now(),
            ended_at: Utc::now(),
        }
    }

    #[test]
    fn test_closure_listener() {
        let tmp = tempfile::tempdir().unwrap();
        let mut received = Vec::new();
        {
            let mut listener = |s: CompletedSession| received.push(s.id);
            listener.on_session_stop(session(tmp.path()));
        }
        assert_eq!(received.len(), 1);
    }

    #[test]
    fn test_channel_listener() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        let sent = session(tmp.path());
        tx.on_session_stop(sent.clone());
        assert_eq!(rx.try_recv().unwrap(), sent);
    }

    #[test]
    fn test_manifest_listener_writes_then_forwards() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut listener = ManifestListener::new(tx);

        let sent = session(tmp.path());
        listener.on_session_stop(sent.clone());

        let manifest = tmp.path().join(storage::MANIFEST_FILE_NAME);
        assert_eq!(storage::load_manifest(&manifest).unwrap(), sent);
        assert_eq!(rx.try_recv().unwrap(), sent);
    }
}
