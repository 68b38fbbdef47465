//! Command-line entry point for a LocalSend-compatible node.
//!
//! Flag parsing here is intentionally thin: the node itself (registry,
//! session manager, discovery, transport) is the thing this crate
//! specifies. Running with no subcommand starts the node as a headless
//! daemon; `send` uploads files to an already-known peer.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use localsend_core::{
    config::{IdentityConfig, TlsConfig},
    HeadlessObserver, NodeConfig, NodeIdentity, PeerRegistry, SessionManager,
};
use localsend_discovery::{DiscoveryService, RegisterClient};
use localsend_transport::UploadClient;
use tokio_util::sync::CancellationToken;

/// A LocalSend-compatible LAN file transfer node.
#[derive(Parser)]
#[command(name = "localsend-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    /// TCP port to listen on.
    #[arg(short, long, default_value_t = 53317)]
    port: u16,

    /// Display name advertised to peers.
    #[arg(long, default_value = "localsend-node")]
    alias: String,

    /// Directory incoming files are written to.
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Disable TLS and serve plain HTTP.
    #[arg(long)]
    no_tls: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send files to a peer already present in the registry once
    /// discovery has run.
    Send {
        /// Peer's fingerprint, as seen in discovery logs.
        fingerprint: String,
        /// Files to send.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .init();

    let mut config = NodeConfig::default();
    config.port = cli.port;
    config.identity.alias = cli.alias.clone();
    config.tls.enabled = !cli.no_tls;
    if let Some(dir) = cli
        .download_dir
        .clone()
        .or_else(|| dirs::download_dir().map(|dir| dir.join("localsend")))
    {
        config.transfer.download_dir = dir;
    }

    let identity = NodeIdentity::build(config.port, &config.identity, &config.tls)?;
    tracing::info!(fingerprint = %identity.descriptor().fingerprint, "node identity ready");

    let observer = Arc::new(HeadlessObserver);
    let registry = Arc::new(PeerRegistry::new(observer.clone()));
    registry.set_local(identity.descriptor().clone());

    let root_cancel = CancellationToken::new();
    let session_manager = Arc::new(SessionManager::new(
        observer,
        root_cancel.clone(),
        config.transfer.download_dir.clone(),
        config.transfer.offer_timeout,
    ));

    let register_client = Arc::new(RegisterClient::new(
        identity.descriptor(),
        config.discovery.register_timeout,
        config.discovery.subnet_scan_concurrency,
    )?);

    let discovery = DiscoveryService::start(
        &config,
        Arc::clone(&registry),
        Arc::clone(&register_client),
        root_cancel.clone(),
    )
    .await?;

    let app_state = localsend_transport::app_state(Arc::clone(&registry), Arc::clone(&session_manager));
    let router = localsend_transport::router(app_state);

    let server_task = {
        let port = config.port;
        let tls_enabled = config.tls.enabled;
        let credentials = identity.credentials.clone();
        tokio::spawn(async move {
            let result = if tls_enabled {
                localsend_transport::serve_https(port, router, &credentials).await
            } else {
                localsend_transport::serve_http(port, router).await
            };
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with an error");
            }
        })
    };

    match cli.command {
        Some(Commands::Send { fingerprint, files }) => {
            let peer = registry
                .get(&fingerprint)
                .ok_or_else(|| anyhow::anyhow!("unknown peer fingerprint: {fingerprint}"))?;
            let upload_client = UploadClient::new(
                identity.descriptor().clone(),
                Arc::clone(&session_manager),
                config.transfer.upload_header_timeout,
                config.transfer.upload_timeout,
            )?;
            upload_client.upload_files(&peer, &files).await?;
            tracing::info!("upload complete");
        }
        None => {
            tracing::info!(port = config.port, "running as a headless daemon, Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            root_cancel.cancel();
        }
    }

    server_task.abort();
    discovery.join().await;
    Ok(())
}
