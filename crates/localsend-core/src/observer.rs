//! UI-decoupling observer interface.
//!
//! The session manager and registry never depend on a concrete UI: they
//! report events through this trait. The `offer_session` callback hands
//! back a `oneshot::Sender<bool>` rather than being awaited directly, so
//! implementations that live on a different thread (a terminal UI event
//! loop, say) can reply whenever the user acts, without the session
//! manager holding any lock or task open.

use tokio::sync::oneshot;

use crate::session::Session;
use crate::types::PeerDescriptor;

/// Observes registry and session lifecycle events.
///
/// All methods are synchronous and must return promptly: none of them
/// should block on I/O or user input themselves. `offer_session` is the
/// one callback that represents a decision point; the decision arrives
/// later over `reply`.
pub trait Observer: Send + Sync {
    /// A new peer was added to the registry.
    fn peer_added(&self, _peer: &PeerDescriptor) {}

    /// A peer was removed from the registry.
    fn peer_removed(&self, _peer: &PeerDescriptor) {}

    /// An incoming transfer was offered. The implementation must
    /// eventually send `true` (accept) or `false` (reject) on `reply`;
    /// dropping it without sending is treated as a reject.
    fn offer_session(&self, session: &Session, reply: oneshot::Sender<bool>);

    /// A single file within a session finished (success or failure
    /// indicated by `succeeded`).
    fn file_finished(&self, _session_id: &str, _file_id: &str, _succeeded: bool) {}

    /// A session was installed (either offered-and-accepted, or created
    /// for an outgoing upload).
    fn session_created(&self, _session_id: &str) {}

    /// A session completed: every file finished.
    fn session_finished(&self, _session_id: &str) {}

    /// A session was cancelled, locally or by the remote peer.
    fn session_cancelled(&self, _session_id: &str) {}
}

/// Non-interactive observer that accepts every offered session
/// immediately. This is the node's default when no UI is attached,
/// matching the reference implementation's `HeadlessUI`.
#[derive(Debug, Default)]
pub struct HeadlessObserver;

impl Observer for HeadlessObserver {
    fn offer_session(&self, session: &Session, reply: oneshot::Sender<bool>) {
        tracing::info!(session_id = %session.session_id, "auto-accepting incoming session");
        let _ = reply.send(true);
    }

    fn session_created(&self, session_id: &str) {
        tracing::debug!(session_id, "session created");
    }

    fn session_finished(&self, session_id: &str) {
        tracing::info!(session_id, "session finished");
    }

    fn session_cancelled(&self, session_id: &str) {
        tracing::info!(session_id, "session cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionRole};
    use crate::types::PeerDescriptor;
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    fn peer() -> PeerDescriptor {
        PeerDescriptor {
            alias: "peer".into(),
            version: "2.0".into(),
            device_model: String::new(),
            device_type: String::new(),
            fingerprint: "fp".into(),
            port: 1,
            protocol: "https".into(),
            download: true,
            ip: None,
        }
    }

    #[tokio::test]
    async fn headless_observer_always_accepts() {
        let observer = HeadlessObserver;
        let session = Session::new(
            "gclsnd-1".into(),
            peer(),
            HashMap::new(),
            SessionRole::Download,
            CancellationToken::new(),
        );
        let (tx, rx) = oneshot::channel();
        observer.offer_session(&session, tx);
        assert!(rx.await.unwrap());
    }
}
