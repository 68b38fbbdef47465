//! A single transfer session: one or more files moving between this node
//! and one peer, in one direction.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::types::{FileOffer, PeerDescriptor};

/// Which side of the transfer this node is playing for a given session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// This node is receiving files.
    Download,
    /// This node is sending files.
    Upload,
}

/// State of one transfer in progress.
///
/// `remaining` and `files` are guarded by the same mutex so that
/// `finish_file` can check-and-decrement atomically without a second
/// lock acquisition on the session manager's outer table.
pub struct Session {
    /// Opaque id, unique among this node's current downloads or among
    /// its current uploads (the two namespaces may overlap).
    pub session_id: String,
    /// The other party in this transfer.
    pub peer: PeerDescriptor,
    /// Whether this node is sending or receiving.
    pub role: SessionRole,
    /// Cancellation scope for every network/file operation inside this
    /// session, derived from the node's root cancellation scope.
    pub cancel_token: CancellationToken,
    state: Mutex<SessionState>,
}

struct SessionState {
    files: HashMap<String, FileOffer>,
    remaining: usize,
}

impl Session {
    /// Build a new session over `files`, keyed by file id.
    #[must_use]
    pub fn new(
        session_id: String,
        peer: PeerDescriptor,
        files: HashMap<String, FileOffer>,
        role: SessionRole,
        cancel_token: CancellationToken,
    ) -> Self {
        let remaining = files.len();
        Self {
            session_id,
            peer,
            role,
            cancel_token,
            state: Mutex::new(SessionState { files, remaining }),
        }
    }

    /// Look up a file's token by id.
    #[must_use]
    pub fn token_for(&self, file_id: &str) -> Option<String> {
        self.state
            .lock()
            .expect("session lock poisoned")
            .files
            .get(file_id)
            .map(|file| file.token.clone())
    }

    /// Destination path for a file by id (download: where to write it;
    /// upload: where to read it from).
    #[must_use]
    pub fn destination_for(&self, file_id: &str) -> Option<std::path::PathBuf> {
        self.state
            .lock()
            .expect("session lock poisoned")
            .files
            .get(file_id)
            .map(|file| file.destination.clone())
    }

    /// Returns true iff `file_id` is part of this session.
    #[must_use]
    pub fn has_file(&self, file_id: &str) -> bool {
        self.state
            .lock()
            .expect("session lock poisoned")
            .files
            .contains_key(file_id)
    }

    /// Snapshot of the session's file ids in insertion order is not
    /// guaranteed; callers that need determinism should sort.
    #[must_use]
    pub fn file_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("session lock poisoned")
            .files
            .keys()
            .cloned()
            .collect()
    }

    /// Mark a file done. Idempotent: marking an already-done file again
    /// does not decrement `remaining` twice. Returns `true` iff this call
    /// brought `remaining` to zero (the session just finished).
    pub fn mark_file_done(&self, file_id: &str) -> bool {
        let mut state = self.state.lock().expect("session lock poisoned");
        let already_done = state.files.get(file_id).map(|f| f.done).unwrap_or(true);
        if already_done {
            return false;
        }
        if let Some(file) = state.files.get_mut(file_id) {
            file.done = true;
        }
        state.remaining = state.remaining.saturating_sub(1);
        state.remaining == 0
    }

    /// Number of files not yet marked done.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.state.lock().expect("session lock poisoned").remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn file(id: &str) -> FileOffer {
        FileOffer {
            id: id.into(),
            file_name: format!("{id}.bin"),
            size: 10,
            file_type: String::new(),
            sha256: None,
            preview: None,
            metadata: None,
            token: format!("token-{id}"),
            destination: std::path::PathBuf::from(format!("/tmp/{id}.bin")),
            done: false,
        }
    }

    fn session_with(file_ids: &[&str]) -> Session {
        let files = file_ids.iter().map(|id| (id.to_string(), file(id))).collect();
        Session::new(
            "gclsnd-1".into(),
            peer(),
            files,
            SessionRole::Download,
            CancellationToken::new(),
        )
    }

    #[test]
    fn mark_file_done_is_idempotent() {
        let session = session_with(&["a", "b"]);
        assert!(!session.mark_file_done("a"));
        assert_eq!(session.remaining(), 1);
        assert!(!session.mark_file_done("a"));
        assert_eq!(session.remaining(), 1, "double completion must not double-decrement");
        assert!(session.mark_file_done("b"));
        assert_eq!(session.remaining(), 0);
    }

    #[test]
    fn token_for_returns_assigned_token() {
        let session = session_with(&["a"]);
        assert_eq!(session.token_for("a").as_deref(), Some("token-a"));
        assert_eq!(session.token_for("missing"), None);
    }
}
