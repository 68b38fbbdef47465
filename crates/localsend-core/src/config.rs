//! Node configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for a LocalSend-compatible node.
///
/// Loading this from a file or environment is outside this crate's scope;
/// `localsend-cli` builds one from a handful of flags and hands it to the
/// rest of the node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// TCP port the HTTP(S) server binds on and advertises to peers.
    pub port: u16,

    /// Identity fields advertised in every peer descriptor.
    pub identity: IdentityConfig,

    /// Multicast discovery configuration.
    pub discovery: DiscoveryConfig,

    /// Transfer session configuration.
    pub transfer: TransferConfig,

    /// TLS configuration.
    pub tls: TlsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Auto-select in tests so concurrent test binaries don't fight
            // over a fixed port.
            #[cfg(test)]
            port: 0,
            #[cfg(not(test))]
            port: 53317,
            identity: IdentityConfig::default(),
            discovery: DiscoveryConfig::default(),
            transfer: TransferConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

/// Fields this node advertises as part of its `PeerDescriptor`.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Human-readable display name.
    pub alias: String,
    /// Free-form device model string.
    pub device_model: Option<String>,
    /// One of the LocalSend device type strings (mobile/desktop/web/
    /// headless/server), or empty.
    pub device_type: String,
    /// Whether this node accepts incoming transfers without a companion
    /// UI prompting for a download.
    pub download: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            alias: "localsend-node".to_string(),
            device_model: None,
            device_type: "headless".to_string(),
            download: true,
        }
    }
}

/// Multicast discovery configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Multicast group address, e.g. `224.0.0.167`.
    pub multicast_group: std::net::Ipv4Addr,
    /// Multicast group port, e.g. `53317`.
    pub multicast_port: u16,
    /// Interval between periodic re-announcements.
    pub announce_interval: Duration,
    /// Timeout for a single HTTP registration request.
    pub register_timeout: Duration,
    /// Max concurrent requests during a subnet registration scan.
    pub subnet_scan_concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast_group: std::net::Ipv4Addr::new(224, 0, 0, 167),
            multicast_port: 53317,
            announce_interval: Duration::from_secs(60),
            register_timeout: Duration::from_secs(2),
            subnet_scan_concurrency: 32,
        }
    }
}

/// Transfer session configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Directory incoming files are written to.
    pub download_dir: PathBuf,
    /// How long an offered session waits for a UI decision before it is
    /// treated as rejected.
    pub offer_timeout: Duration,
    /// Timeout for the headers of an upload HTTP request.
    pub upload_header_timeout: Duration,
    /// Timeout for a whole upload HTTP request (headers + body).
    pub upload_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            offer_timeout: Duration::from_secs(60),
            upload_header_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(120),
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs_download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Resolves `~/Downloads` without introducing a dependency on `dirs` in
/// this crate; `localsend-cli` is expected to override this default via
/// its own `dirs`-backed resolution.
fn dirs_download_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join("Downloads").join("localsend"))
}

/// TLS configuration.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Whether to serve HTTPS (with a self-signed certificate) instead of
    /// plain HTTP.
    pub enabled: bool,
    /// Directory `cert.pem`/`key.pem` are read from or written to.
    pub cert_dir: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cert_dir: PathBuf::from(".localsend"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_internally_consistent() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.discovery.multicast_group.to_string(), "224.0.0.167");
        assert_eq!(cfg.discovery.multicast_port, 53317);
        assert!(cfg.identity.download);
    }
}
