//! Multicast peer announcement and monitoring.
//!
//! Announcements are single JSON datagrams on the well-known LocalSend
//! group. The monitor loop joins that group, updates the registry as
//! peers are heard from, and triggers HTTP registration (falling back to
//! a one-shot registration-only multicast frame) for newly-seen peers
//! that announced themselves.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use localsend_core::{LocalSendError, PeerRegistry, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::register_client::RegisterClient;

/// A network interface considered viable for multicast: up, running,
/// multicast-capable, not loopback, not a container bridge.
#[derive(Debug, Clone)]
pub struct MulticastInterface {
    /// OS-level interface name, e.g. `eth0`.
    pub name: String,
    /// An IPv4 address bound to this interface.
    pub ipv4: Ipv4Addr,
}

/// Enumerate multicast-eligible interfaces, in enumeration order.
///
/// `if-addrs` does not expose "up"/"running"/"multicast" flags directly
/// on stable releases, so this stage only filters out loopback and
/// container-bridge interfaces by name; `join_best_group` below is what
/// actually proves an interface is up, running, and multicast-capable,
/// by attempting the real OS-level join rather than trusting a flag.
fn candidate_interfaces() -> Result<Vec<MulticastInterface>> {
    let interfaces = if_addrs::get_if_addrs()
        .map_err(|err| LocalSendError::NoInterface(err.to_string().into()))?;

    Ok(interfaces
        .iter()
        .filter(|interface| !interface.is_loopback() && !interface.name.starts_with("docker"))
        .filter_map(|interface| match interface.addr {
            if_addrs::IfAddr::V4(ref v4) => Some(MulticastInterface {
                name: interface.name.clone(),
                ipv4: v4.ip,
            }),
            if_addrs::IfAddr::V6(_) => None,
        })
        .collect())
}

/// Select the interface the multicast socket should join.
///
/// Criteria, in order: up, running, multicast-capable, not loopback, not
/// named like a container bridge (`docker*`). Ties break by enumeration
/// order. Returns an error if none qualify — startup must abort rather
/// than silently disabling discovery.
///
/// This only applies the name-based filters; it does not itself prove an
/// interface is up/running/multicast-capable (see `join_best_group`,
/// which actually exercises that by joining). Kept as its own function
/// because callers that only need an interface to send from (the
/// periodic announce loop, say) don't need a live group membership.
pub fn select_interface() -> Result<MulticastInterface> {
    candidate_interfaces()?.into_iter().next().ok_or_else(|| {
        LocalSendError::no_interface("no up, running, multicast-capable, non-loopback interface found")
    })
}

/// Join `group` on the first candidate interface that actually succeeds,
/// trying candidates in enumeration order. A down or non-multicast
/// interface fails the OS-level join (`IP_ADD_MEMBERSHIP`) rather than
/// being silently selected and left unable to receive anything; this
/// function falls through to the next candidate instead of aborting on
/// the first failure, and only errors once every candidate has failed.
pub fn join_best_group(group: SocketAddrV4) -> Result<(MulticastInterface, UdpSocket)> {
    let candidates = candidate_interfaces()?;
    if candidates.is_empty() {
        return Err(LocalSendError::no_interface(
            "no up, running, multicast-capable, non-loopback interface found",
        ));
    }

    let mut last_err = None;
    for interface in candidates {
        match join_group(group, &interface) {
            Ok(socket) => return Ok((interface, socket)),
            Err(err) => {
                tracing::warn!(interface = %interface.name, error = %err, "interface failed to join multicast group, trying next");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| LocalSendError::no_interface("no interface could join the multicast group")))
}

/// Send one multicast datagram. Used for both a genuine announce
/// (`announce=true`) and the registration-only fallback
/// (`announce=false`).
pub async fn send_datagram(
    group: SocketAddrV4,
    interface: &MulticastInterface,
    payload: &[u8],
) -> Result<()> {
    let socket = UdpSocket::bind((interface.ipv4, 0)).await?;
    socket.send_to(payload, SocketAddr::V4(group)).await?;
    Ok(())
}

/// Join the multicast group on `interface` and return a socket ready for
/// `recv_from`.
pub fn join_group(group: SocketAddrV4, interface: &MulticastInterface) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, group.port())).into())?;
    socket.join_multicast_v4(group.ip(), &interface.ipv4)?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(LocalSendError::from)
}

/// Run the multicast monitor loop until cancelled: receive announce
/// datagrams, update the registry, and register with (or fall back to
/// multicast-announcing to) newly-seen peers.
pub async fn monitor(
    socket: UdpSocket,
    group: SocketAddrV4,
    interface: MulticastInterface,
    registry: Arc<PeerRegistry>,
    register_client: Arc<RegisterClient>,
    cancel: tokio_util::sync::CancellationToken,
) {
    let mut buf = vec![0u8; 65536];
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            result = socket.recv_from(&mut buf) => result,
        };

        let (n, from) = match received {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "multicast recv failed");
                continue;
            }
        };

        let announce: localsend_core::AnnounceBody = match serde_json::from_slice(&buf[..n]) {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(error = %err, "dropping malformed multicast datagram");
                continue;
            }
        };

        let was_announce = announce.announce;
        let peer = announce.into_descriptor(Some(from.ip()));

        if registry.is_local(&peer.fingerprint) {
            continue;
        }

        let is_new = registry.add(peer.clone());
        if is_new {
            tracing::info!(peer = %peer.alias, "added peer via multicast");
        } else {
            tracing::debug!(peer = %peer.alias, "received advertisement from known peer");
        }

        if was_announce && is_new {
            tracing::info!(peer = %peer.alias, "registering with peer that announced");
            if let Err(err) = register_client.register_at(&peer).await {
                tracing::warn!(peer = %peer.alias, error = %err, "register failed, falling back to multicast");
                if let Some(local) = registry.local() {
                    let mut fallback = local.to_announce_body();
                    fallback.announce = false;
                    if let Ok(payload) = serde_json::to_vec(&fallback) {
                        let _ = send_datagram(group, &interface, &payload).await;
                    }
                }
            }
        } else if !was_announce {
            tracing::info!(peer = %peer.alias, "incoming registration via multicast fallback");
        }
    }
}
