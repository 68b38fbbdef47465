//! Session lifecycle management.
//!
//! Owns two independently-locked tables, `downloads` and `uploads`, each
//! keyed by session id. The two key spaces may overlap (a download's id
//! is chosen by this node; an upload's id is adopted verbatim from the
//! remote peer) so callers that need to act on "whichever table has this
//! id" look in both rather than merging them into one map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{LocalSendError, Result};
use crate::observer::Observer;
use crate::session::{Session, SessionRole};
use crate::types::{FileOffer, PeerDescriptor, SessionInfo};

/// Coordinates incoming and outgoing transfer sessions.
pub struct SessionManager {
    downloads: Arc<DashMap<String, Arc<Session>>>,
    uploads: Arc<DashMap<String, Arc<Session>>>,
    observer: Arc<dyn Observer>,
    root_cancel: CancellationToken,
    next_session_id: AtomicU64,
    download_dir: std::path::PathBuf,
    offer_timeout: Duration,
}

impl SessionManager {
    /// Create a session manager rooted at `root_cancel`: dropping or
    /// cancelling that token cancels every session this manager ever
    /// creates.
    #[must_use]
    pub fn new(
        observer: Arc<dyn Observer>,
        root_cancel: CancellationToken,
        download_dir: std::path::PathBuf,
        offer_timeout: Duration,
    ) -> Self {
        Self {
            downloads: Arc::new(DashMap::new()),
            uploads: Arc::new(DashMap::new()),
            observer,
            root_cancel,
            next_session_id: AtomicU64::new(1),
            download_dir,
            offer_timeout,
        }
    }

    /// Handle an incoming `prepare-upload`: assign a session id and
    /// per-file tokens, ask the observer whether to accept, and install
    /// the session iff accepted.
    ///
    /// The observer is invoked without any session-table lock held.
    pub async fn offer_incoming(
        &self,
        peer: PeerDescriptor,
        mut files: HashMap<String, FileOffer>,
    ) -> Result<SessionInfo> {
        let session_id = self.next_session_id();

        for (file_id, file) in files.iter_mut() {
            file.token = tokenize(&session_id, file_id);
            file.destination = self.download_dir.join(&file.file_name);
        }

        let cancel_token = self.root_cancel.child_token();
        let session = Arc::new(Session::new(
            session_id.clone(),
            peer,
            files,
            SessionRole::Download,
            cancel_token,
        ));

        let (reply_tx, reply_rx) = oneshot::channel();
        self.observer.offer_session(&session, reply_tx);

        let accepted = tokio::time::timeout(self.offer_timeout, reply_rx)
            .await
            .map(|result| result.unwrap_or(false))
            .unwrap_or(false);

        if !accepted {
            return Err(LocalSendError::Rejected);
        }

        let info = session_info(&session);
        self.downloads.insert(session_id.clone(), session);
        self.observer.session_created(&session_id);
        Ok(info)
    }

    /// Install a session for an outgoing upload, adopting the remote
    /// peer's session id and per-file tokens verbatim.
    pub fn create_upload(
        &self,
        peer: PeerDescriptor,
        remote_info: SessionInfo,
        mut files: HashMap<String, FileOffer>,
    ) -> Arc<Session> {
        for (file_id, token) in &remote_info.files {
            if let Some(file) = files.get_mut(file_id) {
                file.token = token.clone();
            }
        }

        let cancel_token = self.root_cancel.child_token();
        let session = Arc::new(Session::new(
            remote_info.session_id.clone(),
            peer,
            files,
            SessionRole::Upload,
            cancel_token,
        ));

        self.uploads.insert(remote_info.session_id.clone(), Arc::clone(&session));
        self.observer.session_created(&remote_info.session_id);
        session
    }

    /// Cancel a session, wherever it lives. Triggers its cancellation
    /// token so in-flight I/O aborts cooperatively, then removes it.
    /// Unknown ids are a no-op.
    pub fn cancel(&self, session_id: &str) {
        let removed = self
            .downloads
            .remove(session_id)
            .or_else(|| self.uploads.remove(session_id));
        if let Some((_, session)) = removed {
            session.cancel_token.cancel();
            self.observer.session_cancelled(session_id);
        }
    }

    /// Mark one file done within a session. Idempotent. Emits
    /// `file_finished` unconditionally and `session_finished` exactly
    /// once, when the last file completes.
    pub fn finish_file(&self, session_id: &str, file_id: &str, succeeded: bool) -> Result<()> {
        let table = self.table_containing(session_id)?;
        let session = table
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LocalSendError::UnknownSession(session_id.to_string()))?;

        if !session.has_file(file_id) {
            return Err(LocalSendError::UnknownFile {
                session_id: session_id.to_string(),
                file_id: file_id.to_string(),
            });
        }

        self.observer.file_finished(session_id, file_id, succeeded);

        if succeeded && session.mark_file_done(file_id) {
            table.remove(session_id);
            self.observer.session_finished(session_id);
        }

        Ok(())
    }

    /// Look up a session's cancellation token, wherever it lives.
    #[must_use]
    pub fn cancellation_for(&self, session_id: &str) -> Option<CancellationToken> {
        self.downloads
            .get(session_id)
            .or_else(|| self.uploads.get(session_id))
            .map(|entry| entry.cancel_token.clone())
    }

    /// Look up a session by id in the downloads table.
    #[must_use]
    pub fn get_download(&self, session_id: &str) -> Option<Arc<Session>> {
        self.downloads.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a session by id in the uploads table.
    #[must_use]
    pub fn get_upload(&self, session_id: &str) -> Option<Arc<Session>> {
        self.uploads.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    fn table_containing(&self, session_id: &str) -> Result<Arc<DashMap<String, Arc<Session>>>> {
        if self.downloads.contains_key(session_id) {
            Ok(Arc::clone(&self.downloads))
        } else if self.uploads.contains_key(session_id) {
            Ok(Arc::clone(&self.uploads))
        } else {
            Err(LocalSendError::UnknownSession(session_id.to_string()))
        }
    }

    fn next_session_id(&self) -> String {
        let n = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        format!("gclsnd-{n}")
    }
}

/// `hex(SHA-256(session_id + "." + file_id))`.
fn tokenize(session_id: &str, file_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(b".");
    hasher.update(file_id.as_bytes());
    hex::encode(hasher.finalize())
}

fn session_info(session: &Session) -> SessionInfo {
    let mut files = HashMap::new();
    for file_id in session.file_ids() {
        if let Some(token) = session.token_for(&file_id) {
            files.insert(file_id, token);
        }
    }
    SessionInfo {
        session_id: session.session_id.clone(),
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::HeadlessObserver;

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(HeadlessObserver),
            CancellationToken::new(),
            std::path::PathBuf::from("/tmp/localsend-test"),
            Duration::from_secs(1),
        )
    }

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
            size: 4,
            file_type: String::new(),
            sha256: None,
            preview: None,
            metadata: None,
            token: String::new(),
            destination: std::path::PathBuf::new(),
            done: false,
        }
    }

    #[test]
    fn tokenize_is_stable_and_unique_per_file() {
        let a = tokenize("gclsnd-1", "f1");
        let b = tokenize("gclsnd-1", "f1");
        let c = tokenize("gclsnd-1", "f2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn session_ids_start_at_one_and_increase() {
        let manager = manager();
        assert_eq!(manager.next_session_id(), "gclsnd-1");
        assert_eq!(manager.next_session_id(), "gclsnd-2");
    }

    #[tokio::test]
    async fn offer_incoming_installs_session_on_accept() {
        let manager = manager();
        let mut files = HashMap::new();
        files.insert("f1".to_string(), file("f1"));
        let info = manager.offer_incoming(peer(), files).await.unwrap();
        assert_eq!(info.session_id, "gclsnd-1");
        assert!(manager.get_download(&info.session_id).is_some());
        assert_eq!(info.files.len(), 1);
    }

    #[tokio::test]
    async fn finish_file_is_exactly_once_at_completion() {
        let manager = manager();
        let mut files = HashMap::new();
        files.insert("f1".to_string(), file("f1"));
        files.insert("f2".to_string(), file("f2"));
        let info = manager.offer_incoming(peer(), files).await.unwrap();

        manager.finish_file(&info.session_id, "f1", true).unwrap();
        assert!(manager.get_download(&info.session_id).is_some(), "session still live with one file left");

        manager.finish_file(&info.session_id, "f2", true).unwrap();
        assert!(
            manager.get_download(&info.session_id).is_none(),
            "session removed once every file finishes"
        );

        // A further call for an id no longer installed surfaces as unknown.
        assert!(manager.finish_file(&info.session_id, "f1", true).is_err());
    }

    #[tokio::test]
    async fn cancel_removes_the_session_and_triggers_its_token() {
        let manager = manager();
        let mut files = HashMap::new();
        files.insert("f1".to_string(), file("f1"));
        let info = manager.offer_incoming(peer(), files).await.unwrap();
        let token = manager.cancellation_for(&info.session_id).unwrap();

        manager.cancel(&info.session_id);

        assert!(token.is_cancelled());
        assert!(manager.get_download(&info.session_id).is_none());
    }

    #[test]
    fn cancel_on_unknown_session_is_a_no_op() {
        let manager = manager();
        manager.cancel("gclsnd-999");
    }

    #[tokio::test]
    async fn create_upload_adopts_remote_session_id_and_tokens() {
        let manager = manager();
        let mut files = HashMap::new();
        files.insert("f1".to_string(), file("f1"));
        let remote_info = SessionInfo {
            session_id: "gclsnd-7".to_string(),
            files: [("f1".to_string(), "remote-token".to_string())].into_iter().collect(),
        };
        let session = manager.create_upload(peer(), remote_info, files);
        assert_eq!(session.session_id, "gclsnd-7");
        assert_eq!(session.token_for("f1").as_deref(), Some("remote-token"));
        assert!(manager.get_upload("gclsnd-7").is_some());
    }
}
