//! This node's own identity: its TLS credentials and the descriptor it
//! advertises to every peer.

use crate::config::{IdentityConfig, TlsConfig};
use crate::error::Result;
use crate::tls::TlsCredentials;
use crate::types::PeerDescriptor;

/// Combines this node's TLS credentials with the descriptor fields it
/// advertises on the wire.
#[derive(Clone)]
pub struct NodeIdentity {
    /// Self-signed certificate and derived fingerprint.
    pub credentials: TlsCredentials,
    descriptor: PeerDescriptor,
}

impl NodeIdentity {
    /// Build a node identity: load or generate TLS credentials (when
    /// enabled) and assemble the peer descriptor this node will
    /// advertise.
    pub fn build(port: u16, identity: &IdentityConfig, tls: &TlsConfig) -> Result<Self> {
        let (credentials, protocol) = if tls.enabled {
            (TlsCredentials::load_or_generate(&tls.cert_dir)?, "https")
        } else {
            (plaintext_credentials(), "http")
        };

        let descriptor = PeerDescriptor {
            alias: identity.alias.clone(),
            version: "2.0".to_string(),
            device_model: identity.device_model.clone().unwrap_or_default(),
            device_type: identity.device_type.clone(),
            fingerprint: credentials.fingerprint.clone(),
            port,
            protocol: protocol.to_string(),
            download: identity.download,
            ip: None,
        };

        Ok(Self { credentials, descriptor })
    }

    /// This node's own peer descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &PeerDescriptor {
        &self.descriptor
    }
}

impl std::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("fingerprint", &self.descriptor.fingerprint)
            .field("alias", &self.descriptor.alias)
            .field("protocol", &self.descriptor.protocol)
            .finish_non_exhaustive()
    }
}

/// Placeholder credentials for plaintext mode, where the fingerprint is
/// not backed by a real certificate. A random fingerprint is still
/// required: it is the only identity key the registry has.
fn plaintext_credentials() -> TlsCredentials {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    TlsCredentials {
        cert_pem: String::new(),
        key_pem: String::new(),
        fingerprint: hex::encode(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_in_plaintext_mode_skips_tls() {
        let identity_cfg = IdentityConfig::default();
        let tls_cfg = TlsConfig { enabled: false, ..TlsConfig::default() };
        let identity = NodeIdentity::build(53317, &identity_cfg, &tls_cfg).unwrap();
        assert_eq!(identity.descriptor().protocol, "http");
        assert_eq!(identity.descriptor().fingerprint.len(), 64);
    }

    #[test]
    fn build_with_tls_derives_fingerprint_from_cert() {
        let dir = tempfile::tempdir().unwrap();
        let identity_cfg = IdentityConfig::default();
        let tls_cfg = TlsConfig { enabled: true, cert_dir: dir.path().to_path_buf() };
        let identity = NodeIdentity::build(53317, &identity_cfg, &tls_cfg).unwrap();
        assert_eq!(identity.descriptor().protocol, "https");
        assert_eq!(identity.descriptor().fingerprint, identity.credentials.fingerprint);
    }
}
