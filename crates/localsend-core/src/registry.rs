//! Peer registry.
//!
//! Holds the set of peers this node currently knows about, keyed by
//! fingerprint. The local node's own descriptor is kept in a dedicated
//! slot rather than inserted into the peer table under a sentinel key —
//! see `DESIGN.md` for why.

use std::sync::{Arc, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::observer::Observer;
use crate::types::PeerDescriptor;

/// Thread-safe table of known peers plus the local node's own descriptor.
///
/// Readers and writers never observe a half-updated table: `DashMap`
/// shards guarantee that, and observer callbacks always run after the
/// relevant entry guard has been dropped.
pub struct PeerRegistry {
    peers: DashMap<String, PeerDescriptor>,
    local: RwLock<Option<PeerDescriptor>>,
    observer: Arc<dyn Observer>,
}

impl PeerRegistry {
    /// Create an empty registry that notifies `observer` of peer
    /// add/remove events.
    #[must_use]
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self {
            peers: DashMap::new(),
            local: RwLock::new(None),
            observer,
        }
    }

    /// Set the local node's own descriptor. Does not touch the peer
    /// table and does not notify observers — the local node is not a
    /// "peer" by definition.
    pub fn set_local(&self, descriptor: PeerDescriptor) {
        let mut slot = self.local.write().expect("local registry lock poisoned");
        *slot = Some(descriptor);
    }

    /// Return the local node's descriptor, if it has been set.
    #[must_use]
    pub fn local(&self) -> Option<PeerDescriptor> {
        self.local.read().expect("local registry lock poisoned").clone()
    }

    /// Returns true iff `fingerprint` matches the local node's own
    /// fingerprint. Used to suppress self-loops in discovery.
    #[must_use]
    pub fn is_local(&self, fingerprint: &str) -> bool {
        self.local()
            .map(|local| local.fingerprint == fingerprint)
            .unwrap_or(false)
    }

    /// Insert or update a peer. Returns `true` iff this is a genuinely
    /// new fingerprint (observers are notified only in that case).
    ///
    /// Uses the entry API so the contains-then-insert check is one
    /// atomic operation under the shard lock: two concurrent `add`
    /// calls for the same new fingerprint (e.g. the multicast monitor
    /// and a concurrent `register` request) can never both observe
    /// `is_new == true`.
    pub fn add(&self, peer: PeerDescriptor) -> bool {
        match self.peers.entry(peer.fingerprint.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(peer);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(peer.clone());
                self.observer.peer_added(&peer);
                true
            }
        }
    }

    /// Remove a peer by fingerprint. Returns the removed descriptor, if
    /// any, after notifying observers.
    pub fn remove(&self, fingerprint: &str) -> Option<PeerDescriptor> {
        let removed = self.peers.remove(fingerprint).map(|(_, peer)| peer);
        if let Some(peer) = &removed {
            self.observer.peer_removed(peer);
        }
        removed
    }

    /// Returns true iff a peer with this fingerprint is known.
    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.peers.contains_key(fingerprint)
    }

    /// Look up a peer by fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<PeerDescriptor> {
        self.peers.get(fingerprint).map(|entry| entry.clone())
    }

    /// Return the first peer matching `predicate`. Takes a snapshot of
    /// the table rather than holding any shard lock during the scan.
    pub fn find<F>(&self, mut predicate: F) -> Option<PeerDescriptor>
    where
        F: FnMut(&PeerDescriptor) -> bool,
    {
        self.peers
            .iter()
            .map(|entry| entry.value().clone())
            .find(|peer| predicate(peer))
    }

    /// Snapshot of every known peer.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PeerDescriptor> {
        self.peers.iter().map(|entry| entry.value().clone()).collect()
    }
}
