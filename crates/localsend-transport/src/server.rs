//! The HTTP(S) protocol surface: `info`, `register`, `prepare-upload`,
//! `upload`, `cancel`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt as _;
use localsend_core::{PeerRegistry, PreparePayload, SessionManager};
use serde::Deserialize;
use tokio_util::io::StreamReader;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiJson};

/// Shared state every handler sees.
pub struct AppState {
    /// Known peers plus this node's own descriptor.
    pub registry: Arc<PeerRegistry>,
    /// Transfer session lifecycle.
    pub session_manager: Arc<SessionManager>,
}

/// Build the router. The same router serves both HTTP and HTTPS,
/// depending on how the caller binds it (see `localsend-cli`).
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/localsend/v1/info", post(info_handler))
        .route("/api/localsend/v2/info", post(info_handler))
        .route("/api/localsend/v2/register", post(register_handler))
        .route("/api/localsend/v2/prepare-upload", post(prepare_upload_handler))
        .route("/api/localsend/v1/upload", post(upload_handler))
        .route("/api/localsend/v2/upload", post(upload_handler))
        .route("/api/localsend/v2/cancel", post(cancel_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn info_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let local = state
        .registry
        .local()
        .ok_or_else(|| ApiError::Internal("local descriptor not set".to_string()))?;
    Ok(Json(serde_json::to_value(local.to_peer_body()).unwrap()))
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    ApiJson(body): ApiJson<localsend_core::PeerBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let peer = body.into_descriptor(Some(remote.ip()));
    tracing::info!(peer = %peer.alias, ip = %remote.ip(), "registering peer");
    state.registry.add(peer);

    let local = state
        .registry
        .local()
        .ok_or_else(|| ApiError::Internal("local descriptor not set".to_string()))?;
    Ok(Json(serde_json::to_value(local.to_register_response()).unwrap()))
}

async fn prepare_upload_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    ApiJson(payload): ApiJson<PreparePayload>,
) -> Result<Json<localsend_core::SessionInfo>, ApiError> {
    let remote_ip = remote.ip();
    let peer = state
        .registry
        .find(|p| p.ip == Some(remote_ip))
        .unwrap_or_else(|| payload.info.clone().into_descriptor(Some(remote_ip)));

    let info = state
        .session_manager
        .offer_incoming(peer, payload.files)
        .await?;
    Ok(Json(info))
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "fileId")]
    file_id: String,
    token: String,
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let session = state
        .session_manager
        .get_download(&params.session_id)
        .ok_or_else(|| ApiError::Forbidden("unknown session".to_string()))?;

    if !session.has_file(&params.file_id) {
        return Err(ApiError::Forbidden("unknown file".to_string()));
    }

    let expected_token = session.token_for(&params.file_id).unwrap_or_default();
    if expected_token != params.token {
        return Err(ApiError::Internal("token mismatch".to_string()));
    }

    let destination = session
        .destination_for(&params.file_id)
        .ok_or_else(|| ApiError::Internal("missing destination".to_string()))?;

    let write_result = write_body_to_file(body, &destination, session.cancel_token.clone()).await;

    match write_result {
        Ok(()) => {
            state
                .session_manager
                .finish_file(&params.session_id, &params.file_id, true)
                .map_err(ApiError::from)?;
            Ok(StatusCode::OK)
        }
        Err(err) => {
            tracing::warn!(session_id = %params.session_id, file_id = %params.file_id, error = %err, "upload write failed");
            let _ = state
                .session_manager
                .finish_file(&params.session_id, &params.file_id, false);
            Err(ApiError::Internal(err.to_string()))
        }
    }
}

async fn write_body_to_file(
    body: Body,
    destination: &std::path::Path,
    cancel: tokio_util::sync::CancellationToken,
) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let stream = body
        .into_data_stream()
        .map(|result| result.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err)));
    let mut reader = StreamReader::new(stream);
    let mut file = tokio::fs::File::create(destination).await?;

    tokio::select! {
        _ = cancel.cancelled() => {
            Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "session cancelled"))
        }
        result = tokio::io::copy(&mut reader, &mut file) => {
            result.map(|_| ())
        }
    }
}

#[derive(Debug, Deserialize)]
struct CancelParams {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CancelParams>,
) -> StatusCode {
    state.session_manager.cancel(&params.session_id);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use localsend_core::{HeadlessObserver, NodeIdentity, PeerRegistry, SessionManager};
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    fn test_state() -> Arc<AppState> {
        let observer = Arc::new(HeadlessObserver);
        let registry = Arc::new(PeerRegistry::new(observer.clone()));
        let identity = NodeIdentity::build(
            0,
            &localsend_core::config::IdentityConfig::default(),
            &localsend_core::config::TlsConfig { enabled: false, ..Default::default() },
        )
        .unwrap();
        registry.set_local(identity.descriptor().clone());
        let session_manager = Arc::new(SessionManager::new(
            observer,
            CancellationToken::new(),
            std::env::temp_dir(),
            std::time::Duration::from_secs(1),
        ));
        Arc::new(AppState { registry, session_manager })
    }

    #[tokio::test]
    async fn info_handler_returns_local_descriptor() {
        let state = test_state();
        let Json(value) = info_handler(State(state)).await.unwrap();
        assert!(value.get("fingerprint").is_some());
    }

    #[tokio::test]
    async fn upload_handler_rejects_unknown_session() {
        let state = test_state();
        let params = UploadParams {
            session_id: "gclsnd-999".to_string(),
            file_id: "f1".to_string(),
            token: "t".to_string(),
        };
        let result = upload_handler(State(state), Query(params), Body::empty()).await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    async fn prepare_upload_then_upload_writes_the_file() {
        let state = test_state();
        let mut files = HashMap::new();
        files.insert(
            "f1".to_string(),
            localsend_core::FileOffer {
                id: "f1".into(),
                file_name: "hello.txt".into(),
                size: 5,
                file_type: String::new(),
                sha256: None,
                preview: None,
                metadata: None,
                token: String::new(),
                destination: std::path::PathBuf::new(),
                done: false,
            },
        );
        let peer = localsend_core::PeerDescriptor {
            alias: "sender".into(),
            version: "2.0".into(),
            device_model: String::new(),
            device_type: String::new(),
            fingerprint: "sender-fp".into(),
            port: 1,
            protocol: "http".into(),
            download: true,
            ip: None,
        };
        let info = state.session_manager.offer_incoming(peer, files).await.unwrap();
        let token = state
            .session_manager
            .get_download(&info.session_id)
            .unwrap()
            .token_for("f1")
            .unwrap();

        let params = UploadParams {
            session_id: info.session_id.clone(),
            file_id: "f1".to_string(),
            token,
        };
        let status = upload_handler(State(state.clone()), Query(params), Body::from("hello"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(state.session_manager.get_download(&info.session_id).is_none());
    }
}
