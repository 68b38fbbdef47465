//! Sender-side upload client: negotiates a session against a peer's
//! `prepare-upload` endpoint, then streams each file to its `upload`
//! endpoint, honoring cooperative cancellation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use localsend_core::{FileOffer, LocalSendError, PeerDescriptor, PreparePayload, Result, SessionManager};
use tokio_util::io::ReaderStream;

/// Sends local files to a peer, end to end.
pub struct UploadClient {
    client: reqwest::Client,
    local: PeerDescriptor,
    session_manager: Arc<SessionManager>,
}

impl UploadClient {
    /// Build an upload client advertising `local` and using
    /// `session_manager` to track the resulting session.
    pub fn new(
        local: PeerDescriptor,
        session_manager: Arc<SessionManager>,
        header_timeout: std::time::Duration,
        total_timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(header_timeout)
            .timeout(total_timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| LocalSendError::Http(err.to_string()))?;
        Ok(Self {
            client,
            local,
            session_manager,
        })
    }

    /// Offer `file_paths` to `peer`, then stream each one, stopping
    /// early if the session is cancelled (locally or by the peer's
    /// `cancel` request).
    pub async fn upload_files(&self, peer: &PeerDescriptor, file_paths: &[std::path::PathBuf]) -> Result<()> {
        let files = build_file_offers(file_paths).await?;
        let (session_id_info, files) = self.prepare_upload(peer, files).await?;

        let session = self
            .session_manager
            .create_upload(peer.clone(), session_id_info, files);

        let mut file_ids: Vec<String> = session.file_ids();
        file_ids.sort();

        for file_id in file_ids {
            if session.cancel_token.is_cancelled() {
                return Err(LocalSendError::Cancelled);
            }

            let Some(destination) = session.destination_for(&file_id) else {
                continue;
            };
            let Some(token) = session.token_for(&file_id) else {
                continue;
            };

            match self
                .single_upload(peer, &session.session_id, &file_id, &token, &destination, session.cancel_token.clone())
                .await
            {
                Ok(()) => {
                    self.session_manager.finish_file(&session.session_id, &file_id, true)?;
                }
                Err(err) if err.is_cancellation() => {
                    return Err(err);
                }
                Err(err) => {
                    self.session_manager.cancel(&session.session_id);
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    async fn prepare_upload(
        &self,
        peer: &PeerDescriptor,
        files: HashMap<String, FileOffer>,
    ) -> Result<(localsend_core::SessionInfo, HashMap<String, FileOffer>)> {
        let Some(ip) = peer.ip else {
            return Err(LocalSendError::malformed("peer has no known address"));
        };
        let url = format!(
            "{}://{}:{}/api/localsend/v2/prepare-upload",
            peer.protocol, ip, peer.port
        );
        let payload = PreparePayload {
            info: self.local.to_peer_body(),
            files: files.clone(),
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| LocalSendError::Http(err.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(prepare_upload_error(status));
        }

        let info: localsend_core::SessionInfo = response
            .json()
            .await
            .map_err(|err| LocalSendError::Serialization(err.to_string().into()))?;
        Ok((info, files))
    }

    async fn single_upload(
        &self,
        peer: &PeerDescriptor,
        session_id: &str,
        file_id: &str,
        token: &str,
        path: &Path,
        cancel: tokio_util::sync::CancellationToken,
    ) -> Result<()> {
        let Some(ip) = peer.ip else {
            return Err(LocalSendError::malformed("peer has no known address"));
        };
        let url = format!("{}://{}:{}/api/localsend/v2/upload", peer.protocol, ip, peer.port);

        let file = tokio::fs::File::open(path).await?;
        let stream = ReaderStream::new(file);
        let body = reqwest::Body::wrap_stream(stream);

        let send = self
            .client
            .post(&url)
            .query(&[("sessionId", session_id), ("fileId", file_id), ("token", token)])
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LocalSendError::Cancelled),
            result = send => result.map_err(|err| LocalSendError::Http(err.to_string()))?,
        };

        let status = response.status().as_u16();
        if status != 200 {
            return Err(upload_error(status));
        }
        Ok(())
    }
}

async fn build_file_offers(paths: &[std::path::PathBuf]) -> Result<HashMap<String, FileOffer>> {
    let mut files = HashMap::new();
    for path in paths {
        let metadata = tokio::fs::metadata(path).await?;
        let modified: Option<SystemTime> = metadata.modified().ok();
        let offer = FileOffer::for_local_file(path, metadata.len(), modified);
        files.insert(offer.id.clone(), offer);
    }
    Ok(files)
}

/// Status-code mapping for `prepare-upload`, grounded in the reference
/// uploader's `prepareUpload`.
fn prepare_upload_error(status: u16) -> LocalSendError {
    match status {
        400 => LocalSendError::malformed("invalid body"),
        401 => LocalSendError::Other("invalid pin".into()),
        403 => LocalSendError::Rejected,
        409 => LocalSendError::Blocked,
        429 => LocalSendError::Other("too many requests".into()),
        500 => LocalSendError::Other("server error".into()),
        other => LocalSendError::Other(format!("unexpected status {other}").into()),
    }
}

/// Status-code mapping for `upload`, grounded in the reference
/// uploader's `singleUpload`.
fn upload_error(status: u16) -> LocalSendError {
    match status {
        400 => LocalSendError::malformed("missing parameters"),
        403 => LocalSendError::Other("invalid token or ip address".into()),
        409 => LocalSendError::Blocked,
        500 => LocalSendError::Other("server error".into()),
        other => LocalSendError::Other(format!("unexpected status {other}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_upload_status_codes_map_as_expected() {
        assert!(matches!(prepare_upload_error(400), LocalSendError::MalformedRequest(_)));
        assert!(matches!(prepare_upload_error(403), LocalSendError::Rejected));
        assert!(matches!(prepare_upload_error(409), LocalSendError::Blocked));
    }

    #[test]
    fn upload_status_codes_map_as_expected() {
        assert!(matches!(upload_error(400), LocalSendError::MalformedRequest(_)));
        assert!(matches!(upload_error(409), LocalSendError::Blocked));
    }

    #[tokio::test]
    async fn build_file_offers_uses_id_prefix_convention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();
        let offers = build_file_offers(&[path]).await.unwrap();
        let offer = offers.values().next().unwrap();
        assert_eq!(offer.id, "ID-notes.txt");
        assert_eq!(offer.size, 5);
    }
}
