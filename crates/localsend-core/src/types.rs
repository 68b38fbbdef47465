//! Wire and internal data types for the LocalSend protocol.
//!
//! `PeerDescriptor` carries more fields than any single wire message uses;
//! the three `*Body` types below project it down to exactly what each
//! endpoint sends or expects, so the field-skipping rules of the protocol
//! live in the type system rather than in ad-hoc serializer attributes.

use std::net::IpAddr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Identity and capability of a node on the LAN.
///
/// `fingerprint` is the identity key used throughout the registry and
/// session manager. `ip` is populated when a descriptor arrives over the
/// network (multicast datagram source, or HTTP remote address) and is
/// never part of the JSON wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    /// Human-readable display name.
    pub alias: String,
    /// Protocol version, e.g. `"2.0"`.
    pub version: String,
    /// Free-form device model string, or empty if unknown.
    pub device_model: String,
    /// One of `mobile`, `desktop`, `web`, `headless`, `server`, or empty.
    pub device_type: String,
    /// Hex-encoded SHA-256 of the peer's TLS certificate (or a random
    /// placeholder in plaintext mode). Identity key.
    pub fingerprint: String,
    /// TCP port the peer's HTTP(S) server listens on.
    pub port: u16,
    /// `"http"` or `"https"`.
    pub protocol: String,
    /// Whether the peer accepts transfers without prompting (API > 5.2).
    pub download: bool,
    /// Source address this descriptor was learned from. Not serialized.
    pub ip: Option<IpAddr>,
}

impl PeerDescriptor {
    /// Project this descriptor into the body sent on `register` requests
    /// and `info` responses.
    #[must_use]
    pub fn to_peer_body(&self) -> PeerBody {
        PeerBody {
            alias: self.alias.clone(),
            version: self.version.clone(),
            device_model: self.device_model.clone(),
            device_type: self.device_type.clone(),
            fingerprint: self.fingerprint.clone(),
            port: self.port,
            protocol: self.protocol.clone(),
            download: self.download,
        }
    }

    /// Project this descriptor into the multicast announce body.
    #[must_use]
    pub fn to_announce_body(&self) -> AnnounceBody {
        AnnounceBody {
            peer: self.to_peer_body(),
            announce: true,
        }
    }

    /// Project this descriptor into the `register` response body, which
    /// omits `protocol` and `announce`.
    #[must_use]
    pub fn to_register_response(&self) -> RegisterResponseBody {
        RegisterResponseBody {
            alias: self.alias.clone(),
            version: self.version.clone(),
            device_model: self.device_model.clone(),
            device_type: self.device_type.clone(),
            fingerprint: self.fingerprint.clone(),
            port: self.port,
            download: self.download,
        }
    }

    fn from_peer_body(body: PeerBody, ip: Option<IpAddr>) -> Self {
        Self {
            alias: body.alias,
            version: body.version,
            device_model: body.device_model,
            device_type: body.device_type,
            fingerprint: body.fingerprint,
            port: body.port,
            protocol: body.protocol,
            download: body.download,
            ip,
        }
    }
}

/// Wire form sent on `register` requests and `info` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerBody {
    pub alias: String,
    pub version: String,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub device_type: String,
    pub fingerprint: String,
    pub port: u16,
    pub protocol: String,
    #[serde(default)]
    pub download: bool,
}

impl PeerBody {
    /// Attach a source IP (learned out-of-band) to recover a full
    /// `PeerDescriptor`.
    #[must_use]
    pub fn into_descriptor(self, ip: Option<IpAddr>) -> PeerDescriptor {
        PeerDescriptor::from_peer_body(self, ip)
    }
}

/// Wire form of a UDP multicast announce datagram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceBody {
    #[serde(flatten)]
    pub peer: PeerBody,
    pub announce: bool,
}

impl AnnounceBody {
    /// Attach a source IP (the datagram's sender) to recover a full
    /// `PeerDescriptor`.
    #[must_use]
    pub fn into_descriptor(self, ip: Option<IpAddr>) -> PeerDescriptor {
        PeerDescriptor::from_peer_body(self.peer, ip)
    }
}

/// Wire form returned by the `register` endpoint: the peer body minus
/// `protocol` and `announce`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponseBody {
    pub alias: String,
    pub version: String,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub device_type: String,
    pub fingerprint: String,
    pub port: u16,
    #[serde(default)]
    pub download: bool,
}

impl RegisterResponseBody {
    /// Recover a full `PeerDescriptor`, supplying the scheme and source
    /// IP that this wire form doesn't carry (register responses omit
    /// `protocol`; the caller knows it from how it reached the peer).
    #[must_use]
    pub fn into_descriptor(self, ip: Option<IpAddr>, protocol: &str) -> PeerDescriptor {
        PeerDescriptor {
            alias: self.alias,
            version: self.version,
            device_model: self.device_model,
            device_type: self.device_type,
            fingerprint: self.fingerprint,
            port: self.port,
            protocol: protocol.to_string(),
            download: self.download,
            ip,
        }
    }
}

/// Optional filesystem timestamps carried alongside a file offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed: Option<String>,
}

/// One file within a transfer session.
///
/// `token` and `destination` are populated by the receiving side once a
/// session is offered; senders never set them. `done` is internal
/// bookkeeping, not part of the wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOffer {
    pub id: String,
    pub file_name: String,
    pub size: u64,
    #[serde(default)]
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,

    /// Opaque per-file credential, assigned by the receiver. Never
    /// serialized in the `prepare-upload` request body; only appears in
    /// the `SessionInfo` response.
    #[serde(skip)]
    pub token: String,

    /// Receiver-side filesystem destination, or sender-side source path.
    /// Internal only.
    #[serde(skip)]
    pub destination: std::path::PathBuf,

    /// Whether this file has completed. Internal only.
    #[serde(skip)]
    pub done: bool,
}

impl FileOffer {
    /// Build a `FileOffer` describing a local file to be sent, in the
    /// `"ID-" + file_name` id convention the reference sender uses.
    pub fn for_local_file(path: &std::path::Path, size: u64, modified: Option<SystemTime>) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = modified.map(|m| FileMetadata {
            modified: humantime_rfc3339(m),
            accessed: None,
        });
        Self {
            id: format!("ID-{file_name}"),
            file_name,
            size,
            file_type: guess_file_type(path),
            sha256: None,
            preview: None,
            metadata,
            token: String::new(),
            destination: path.to_path_buf(),
            done: false,
        }
    }
}

fn humantime_rfc3339(time: SystemTime) -> Option<String> {
    time.duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs().to_string())
}

fn guess_file_type(path: &std::path::Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("application/{ext}"),
        None => "application/octet-stream".to_string(),
    }
}

/// Body of a `prepare-upload` request: the sender's descriptor plus the
/// files it wants to send, keyed by file id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparePayload {
    pub info: PeerBody,
    pub files: std::collections::HashMap<String, FileOffer>,
}

/// Wire view of a session: its id and the per-file tokens the receiver
/// assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub files: std::collections::HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_body_round_trips_through_json() {
        let body = PeerBody {
            alias: "desk".into(),
            version: "2.0".into(),
            device_model: "Linux".into(),
            device_type: "desktop".into(),
            fingerprint: "abc123".into(),
            port: 53317,
            protocol: "https".into(),
            download: true,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"deviceModel\""));
        let back: PeerBody = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fingerprint, "abc123");
    }

    #[test]
    fn announce_body_flattens_peer_fields() {
        let peer = PeerBody {
            alias: "a".into(),
            version: "2.0".into(),
            device_model: String::new(),
            device_type: String::new(),
            fingerprint: "f".into(),
            port: 1,
            protocol: "http".into(),
            download: false,
        };
        let announce = AnnounceBody { peer, announce: true };
        let json = serde_json::to_value(&announce).unwrap();
        assert_eq!(json["announce"], true);
        assert_eq!(json["fingerprint"], "f");
        assert!(json.get("peer").is_none());
    }

    #[test]
    fn register_response_omits_protocol_and_announce() {
        let descriptor = PeerDescriptor {
            alias: "a".into(),
            version: "2.0".into(),
            device_model: String::new(),
            device_type: String::new(),
            fingerprint: "f".into(),
            port: 1,
            protocol: "https".into(),
            download: true,
            ip: None,
        };
        let json = serde_json::to_value(descriptor.to_register_response()).unwrap();
        assert!(json.get("protocol").is_none());
        assert!(json.get("announce").is_none());
    }

    #[test]
    fn file_offer_for_local_file_uses_id_prefix_convention() {
        let path = std::path::Path::new("/tmp/report.pdf");
        let offer = FileOffer::for_local_file(path, 1024, None);
        assert_eq!(offer.id, "ID-report.pdf");
        assert_eq!(offer.file_name, "report.pdf");
        assert_eq!(offer.file_type, "application/pdf");
    }

    #[test]
    fn file_offer_token_and_destination_are_not_serialized() {
        let mut offer = FileOffer::for_local_file(std::path::Path::new("x.txt"), 1, None);
        offer.token = "secret".into();
        let json = serde_json::to_value(&offer).unwrap();
        assert!(json.get("token").is_none());
        assert!(json.get("destination").is_none());
    }
}
