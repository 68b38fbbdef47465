//! Self-signed TLS credentials and fingerprint derivation.
//!
//! The reference implementation's certificate setup is an empty stub, so
//! there is no original behavior to match here beyond the fingerprint
//! formula it does define: `hex(SHA-256(cert_pem_bytes))`. Certificate
//! generation itself follows the `rcgen` + `rustls` pattern used
//! elsewhere in the example pack.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{LocalSendError, Result};

/// A self-signed certificate/key pair and the fingerprint derived from
/// it.
#[derive(Clone)]
pub struct TlsCredentials {
    /// PEM-encoded certificate.
    pub cert_pem: String,
    /// PEM-encoded private key.
    pub key_pem: String,
    /// `hex(SHA-256(cert_pem))`, this node's identity.
    pub fingerprint: String,
}

impl TlsCredentials {
    /// Load existing credentials from `dir`, or generate and persist a
    /// fresh self-signed pair if none exist yet.
    pub fn load_or_generate(dir: &Path) -> Result<Self> {
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");

        if cert_path.exists() && key_path.exists() {
            let cert_pem = std::fs::read_to_string(&cert_path)?;
            let key_pem = std::fs::read_to_string(&key_path)?;
            let fingerprint = fingerprint_of(&cert_pem);
            return Ok(Self {
                cert_pem,
                key_pem,
                fingerprint,
            });
        }

        let credentials = Self::generate()?;
        credentials.persist(dir)?;
        Ok(credentials)
    }

    /// Generate a fresh self-signed certificate for `localhost`.
    pub fn generate() -> Result<Self> {
        let subject_alt_names = vec!["localhost".to_string()];
        let certified_key = rcgen::generate_simple_self_signed(subject_alt_names)
            .map_err(|err| LocalSendError::Tls(err.to_string().into()))?;
        let cert_pem = certified_key.cert.pem();
        let key_pem = certified_key.signing_key.serialize_pem();
        let fingerprint = fingerprint_of(&cert_pem);
        Ok(Self {
            cert_pem,
            key_pem,
            fingerprint,
        })
    }

    fn persist(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        std::fs::write(&cert_path, &self.cert_pem)?;
        std::fs::write(&key_path, &self.key_pem)?;
        set_permissions(&cert_path, 0o644)?;
        set_permissions(&key_path, 0o600)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_permissions(path: &PathBuf, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = std::fs::Permissions::from_mode(mode);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_permissions(_path: &PathBuf, _mode: u32) -> Result<()> {
    Ok(())
}

fn fingerprint_of(cert_pem: &str) -> String {
    let digest = Sha256::digest(cert_pem.as_bytes());
    hex::encode(digest)
}
