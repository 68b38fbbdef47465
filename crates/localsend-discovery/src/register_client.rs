//! HTTP peer registration client.
//!
//! Maintains two `reqwest` clients — one plain, one accepting self-signed
//! certificates — and exposes both the direct `register_at` call and the
//! `/24` subnet-scan fallback.

use std::net::Ipv4Addr;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use localsend_core::{LocalSendError, PeerDescriptor, PeerRegistry, Result};

const REGISTER_PATH_V2: &str = "/api/localsend/v2/register";

/// Registers this node's descriptor with other peers over HTTP.
pub struct RegisterClient {
    plain: reqwest::Client,
    tls_skip_verify: reqwest::Client,
    payload: serde_json::Value,
    subnet_scan_concurrency: usize,
}

impl RegisterClient {
    /// Build a client advertising `local` as the registering node.
    pub fn new(local: &PeerDescriptor, timeout: Duration, subnet_scan_concurrency: usize) -> Result<Self> {
        let plain = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LocalSendError::Http(err.to_string()))?;
        let tls_skip_verify = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| LocalSendError::Http(err.to_string()))?;
        let payload = serde_json::to_value(local.to_peer_body())?;

        Ok(Self {
            plain,
            tls_skip_verify,
            payload,
            subnet_scan_concurrency,
        })
    }

    /// POST this node's descriptor to `peer`'s `register` endpoint. The
    /// response is parsed as a peer body but an empty or malformed one is
    /// only logged, not surfaced as a failure: the HTTP round-trip
    /// succeeding is what matters here, not its payload.
    pub async fn register_at(&self, peer: &PeerDescriptor) -> Result<()> {
        let Some(ip) = peer.ip else {
            return Err(LocalSendError::malformed("peer has no known address"));
        };
        let url = format!("{}://{}:{}{}", peer.protocol, ip, peer.port, REGISTER_PATH_V2);
        match self.register_url(&url, peer.protocol == "https").await {
            Ok(_) | Err(LocalSendError::MalformedRequest(_) | LocalSendError::Serialization(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Register against every address in the `/24` containing `local_ip`,
    /// with bounded concurrency. Unreachable addresses are silently
    /// skipped; this never leaves the `/24` (REDESIGN FLAG: the
    /// reference implementation only scans a ten-address slice of it).
    /// Every address that answers with a peer body is added to
    /// `registry`: the subnet scan is the fallback's only way to learn
    /// of peers, since (unlike the multicast path) nothing added them
    /// there first.
    pub async fn register_at_subnet(&self, local_ip: Ipv4Addr, registry: &PeerRegistry) {
        let octets = local_ip.octets();
        let prefix = [octets[0], octets[1], octets[2]];
        let addresses: Vec<Ipv4Addr> = (1u8..=254)
            .map(|last| Ipv4Addr::new(prefix[0], prefix[1], prefix[2], last))
            .filter(|addr| *addr != local_ip)
            .collect();

        let attempted = addresses.len();
        let reachable = stream::iter(addresses)
            .map(|addr| async move {
                let url = format!("http://{addr}:53317{REGISTER_PATH_V2}");
                self.register_url(&url, false).await.ok().map(|peer| (addr, peer))
            })
            .buffer_unordered(self.subnet_scan_concurrency)
            .filter_map(|result| futures::future::ready(result))
            .map(|(addr, peer)| {
                if !registry.is_local(&peer.fingerprint) {
                    registry.add(peer.into_descriptor(Some(addr.into()), "http"));
                }
            })
            .count()
            .await;

        tracing::info!(attempted, reachable, "subnet registration scan complete");
    }

    async fn register_url(&self, url: &str, use_tls_skip_verify: bool) -> Result<localsend_core::RegisterResponseBody> {
        let client = if use_tls_skip_verify { &self.tls_skip_verify } else { &self.plain };
        let response = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&self.payload)
            .send()
            .await
            .map_err(|err| LocalSendError::Http(err.to_string()))?;

        // Some peers answer with an empty body; treat that as "reachable
        // but nothing learned" rather than an error.
        let bytes = response
            .bytes()
            .await
            .map_err(|err| LocalSendError::Http(err.to_string()))?;
        if bytes.is_empty() {
            return Err(LocalSendError::malformed("empty register response"));
        }
        serde_json::from_slice(&bytes).map_err(LocalSendError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(alias: &str, fingerprint: &str) -> PeerDescriptor {
        PeerDescriptor {
            alias: alias.into(),
            version: "2.0".into(),
            device_model: String::new(),
            device_type: String::new(),
            fingerprint: fingerprint.into(),
            port: 53317,
            protocol: "http".into(),
            download: true,
            ip: None,
        }
    }

    #[test]
    fn register_at_rejects_peer_without_an_address() {
        let local = peer("me", "local-fp");
        let client = RegisterClient::new(&local, Duration::from_secs(1), 8).unwrap();
        let target = peer("them", "remote-fp");
        let result = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(client.register_at(&target));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn subnet_scan_never_leaves_the_slash_24() {
        let local = peer("me", "local-fp");
        let client = RegisterClient::new(&local, Duration::from_millis(5), 16).unwrap();
        let observer = std::sync::Arc::new(localsend_core::HeadlessObserver);
        let registry = PeerRegistry::new(observer);
        // 192.0.2.0/24 is reserved documentation space (RFC 5737): safe
        // to "scan" without touching a real network, and every address
        // below is guaranteed unreachable, so this only proves the loop
        // terminates and stays within the /24.
        client
            .register_at_subnet(Ipv4Addr::new(192, 0, 2, 1), &registry)
            .await;
    }
}
