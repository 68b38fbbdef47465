//! Multicast peer discovery and HTTP registration for a
//! LocalSend-compatible node.

pub mod multicast;
pub mod register_client;
pub mod service;

pub use multicast::{select_interface, MulticastInterface};
pub use register_client::RegisterClient;
pub use service::DiscoveryService;
