//! Core data model, peer registry, TLS identity, and transfer session
//! lifecycle for a LocalSend-compatible LAN file transfer node.
//!
//! This crate has no networking code: it is the state machine that
//! `localsend-discovery` and `localsend-transport` drive.

pub mod config;
pub mod error;
pub mod identity;
pub mod observer;
pub mod registry;
pub mod session;
pub mod session_manager;
pub mod tls;
pub mod types;

pub use config::NodeConfig;
pub use error::{LocalSendError, Result};
pub use identity::NodeIdentity;
pub use observer::{HeadlessObserver, Observer};
pub use registry::PeerRegistry;
pub use session::{Session, SessionRole};
pub use session_manager::SessionManager;
pub use tls::TlsCredentials;
pub use types::{AnnounceBody, FileOffer, PeerBody, PeerDescriptor, PreparePayload, RegisterResponseBody, SessionInfo};
