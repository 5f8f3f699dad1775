//! Membership Index (C2): the authoritative in-memory directory of
//! currently-registered peers, kept under one exclusive discipline per the
//! spec's concurrency model (§5).

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::SeederError;

#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub address: String,
    pub last_alive: i64,
    pub connections: u32,
}

impl PeerRecord {
    fn liveness_key(&self) -> LivenessKey {
        LivenessKey {
            last_alive: Reverse(self.last_alive),
            address: self.address.clone(),
        }
    }

    fn elite_key(&self) -> EliteKey {
        EliteKey {
            connections: self.connections,
            address: self.address.clone(),
        }
    }
}

/// Sorted descending by `last_alive`, ties broken by address, so the set's
/// natural iteration order is exactly the order `alive_since` must return.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct LivenessKey {
    last_alive: Reverse<i64>,
    address: String,
}

/// Sorted ascending by `connections`, ties broken by address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EliteKey {
    connections: u32,
    address: String,
}

struct Inner {
    peers: HashMap<String, PeerRecord>,
    by_liveness: BTreeSet<LivenessKey>,
    by_connections: BTreeSet<EliteKey>,
}

impl Inner {
    fn new() -> Self {
        Self {
            peers: HashMap::new(),
            by_liveness: BTreeSet::new(),
            by_connections: BTreeSet::new(),
        }
    }

    /// A violation here is a bug in this module, not a recoverable
    /// condition (§4.1's failure semantics) — hence `debug_assert`, checked
    /// in tests and debug builds rather than paid for on every request.
    fn check_invariants(&self) {
        debug_assert_eq!(self.peers.len(), self.by_liveness.len());
        debug_assert_eq!(self.peers.len(), self.by_connections.len());
    }
}

pub struct MembershipIndex {
    inner: Mutex<Inner>,
}

impl Default for MembershipIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Registers `address` with `last_alive` initialized to `registered_at`
    /// (the moment of registration, per the glossary). Returns `true` if
    /// newly added, `false` if the address was already present — a
    /// duplicate registration is not an error (§4.1).
    pub fn add(&self, address: &str, registered_at: i64) -> bool {
        let mut inner = self.inner.lock();
        if inner.peers.contains_key(address) {
            return false;
        }
        let record = PeerRecord {
            address: address.to_string(),
            last_alive: registered_at,
            connections: 0,
        };
        inner.by_liveness.insert(record.liveness_key());
        inner.by_connections.insert(record.elite_key());
        inner.peers.insert(record.address.clone(), record);
        inner.check_invariants();
        true
    }

    pub fn remove(&self, address: &str) {
        let mut inner = self.inner.lock();
        match inner.peers.remove(address) {
            Some(record) => {
                inner.by_liveness.remove(&record.liveness_key());
                inner.by_connections.remove(&record.elite_key());
            }
            None => {
                let err = SeederError::UnknownPeer {
                    address: address.to_string(),
                };
                warn!(address, error = %err, "remove: unknown peer, ignoring");
            }
        }
        inner.check_invariants();
    }

    pub fn touch(&self, address: &str, last_alive: i64) {
        let mut inner = self.inner.lock();
        let Some(mut record) = inner.peers.get(address).cloned() else {
            let err = SeederError::UnknownPeer {
                address: address.to_string(),
            };
            warn!(address, error = %err, "touch: unknown peer, ignoring");
            return;
        };
        inner.by_liveness.remove(&record.liveness_key());
        record.last_alive = last_alive;
        inner.by_liveness.insert(record.liveness_key());
        inner.peers.insert(record.address.clone(), record);
        inner.check_invariants();
    }

    pub fn set_connections(&self, address: &str, connections: u32) {
        let mut inner = self.inner.lock();
        let Some(mut record) = inner.peers.get(address).cloned() else {
            let err = SeederError::UnknownPeer {
                address: address.to_string(),
            };
            warn!(address, error = %err, "set_connections: unknown peer, ignoring");
            return;
        };
        inner.by_connections.remove(&record.elite_key());
        record.connections = connections;
        inner.by_connections.insert(record.elite_key());
        inner.peers.insert(record.address.clone(), record);
        inner.check_invariants();
    }

    /// Up to `min(k, size)` addresses, ordered by connections ascending,
    /// ties broken by address.
    pub fn elite_top(&self, k: usize) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .by_connections
            .iter()
            .take(k)
            .map(|key| key.address.clone())
            .collect()
    }

    /// Every address with `last_alive` strictly greater than `since`,
    /// ordered by last-alive descending.
    pub fn alive_since(&self, since: i64) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .by_liveness
            .iter()
            .take_while(|key| key.last_alive.0 > since)
            .map(|key| key.address.clone())
            .collect()
    }

    pub fn size(&self) -> usize {
        self.inner.lock().peers.len()
    }
}
