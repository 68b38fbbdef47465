//! Wires the multicast announce/monitor tasks and the registration
//! client together into one subsystem the CLI binary can start and stop.

use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;

use localsend_core::{NodeConfig, PeerRegistry, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::multicast::{self, MulticastInterface};
use crate::register_client::RegisterClient;

/// Owns the background tasks that keep this node discoverable: the
/// periodic announcer and the multicast monitor loop.
pub struct DiscoveryService {
    announce_task: JoinHandle<()>,
    monitor_task: JoinHandle<()>,
}

impl DiscoveryService {
    /// Select an interface, join the multicast group, and spawn the
    /// announce and monitor tasks. `cancel` is the session manager's
    /// (or node's) root cancellation scope; dropping it stops both
    /// tasks.
    pub async fn start(
        config: &NodeConfig,
        registry: Arc<PeerRegistry>,
        register_client: Arc<RegisterClient>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let group = SocketAddrV4::new(config.discovery.multicast_group, config.discovery.multicast_port);

        // Tries every eligible interface in turn rather than trusting the
        // first candidate's IPv4 address: a down or non-multicast
        // interface fails the join itself instead of being silently
        // selected and left deaf.
        let (interface, monitor_socket) = multicast::join_best_group(group)?;
        let monitor_task = {
            let registry = Arc::clone(&registry);
            let register_client = Arc::clone(&register_client);
            let cancel = cancel.clone();
            let interface = interface.clone();
            tokio::spawn(async move {
                multicast::monitor(monitor_socket, group, interface, registry, register_client, cancel).await;
            })
        };

        let announce_task = {
            let registry = Arc::clone(&registry);
            let interface = interface.clone();
            let interval = config.discovery.announce_interval;
            let cancel = cancel.clone();
            let register_client = Arc::clone(&register_client);
            tokio::spawn(async move {
                run_announce_loop(registry, register_client, group, interface, interval, cancel).await;
            })
        };

        Ok(Self {
            announce_task,
            monitor_task,
        })
    }

    /// Wait for both background tasks to finish (normally only once
    /// their shared cancellation token fires).
    pub async fn join(self) {
        let _ = tokio::join!(self.announce_task, self.monitor_task);
    }
}

async fn run_announce_loop(
    registry: Arc<PeerRegistry>,
    register_client: Arc<RegisterClient>,
    group: SocketAddrV4,
    interface: MulticastInterface,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(local) = registry.local() else {
            continue;
        };
        let announce = local.to_announce_body();
        match serde_json::to_vec(&announce) {
            Ok(payload) => {
                if let Err(err) = multicast::send_datagram(group, &interface, &payload).await {
                    tracing::warn!(error = %err, "periodic announce failed, falling back to subnet scan");
                    match local_ip_address::local_ip() {
                        Ok(std::net::IpAddr::V4(local_ipv4)) => {
                            register_client.register_at_subnet(local_ipv4, &registry).await;
                        }
                        Ok(std::net::IpAddr::V6(_)) => {
                            tracing::warn!("local address is IPv6, cannot run the /24 subnet scan");
                        }
                        Err(err) => tracing::warn!(error = %err, "could not determine local IPv4 for subnet scan"),
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize announce body"),
        }
    }
}
