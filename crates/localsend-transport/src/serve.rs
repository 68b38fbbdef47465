//! Binds the protocol router to a TCP listener, over HTTPS (self-signed)
//! or plain HTTP depending on configuration. Both modes listen on the
//! same port; only the caller's choice of credentials differs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use localsend_core::{LocalSendError, Result, TlsCredentials};

use crate::server::AppState;

/// Serve `router` on `port`, plaintext HTTP. Runs until the process is
/// killed or the listener errors; the caller is expected to race this
/// against its own cancellation scope.
pub async fn serve_http(port: u16, router: Router) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|err| LocalSendError::Io(err.to_string()))
}

/// Serve `router` on `port` over HTTPS, terminating TLS with
/// `credentials`' self-signed certificate.
pub async fn serve_https(port: u16, router: Router, credentials: &TlsCredentials) -> Result<()> {
    let config = RustlsConfig::from_pem(
        credentials.cert_pem.clone().into_bytes(),
        credentials.key_pem.clone().into_bytes(),
    )
    .await
    .map_err(|err| LocalSendError::tls_owned(err.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    axum_server::bind_rustls(addr, config)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|err| LocalSendError::Io(err.to_string()))
}

/// Build the shared app state for the router.
#[must_use]
pub fn app_state(
    registry: Arc<localsend_core::PeerRegistry>,
    session_manager: Arc<localsend_core::SessionManager>,
) -> Arc<AppState> {
    Arc::new(AppState {
        registry,
        session_manager,
    })
}
