//! Source-IP-hash bucket assignment. The base spec is explicit that this is
//! a deployment optimization, not a correctness requirement (§9): a worker
//! is free to serve any bucket, and nothing downstream depends on which
//! worker answered a given datagram. Exposed as a pure function so affinity
//! can be tested without a socket in sight.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

/// Deterministic bucket index in `0..worker_count` for `ip`.
///
/// # Panics
///
/// Panics if `worker_count` is zero.
pub fn bucket_for(ip: IpAddr, worker_count: usize) -> usize {
    assert!(worker_count > 0, "worker_count must be positive");
    let mut hasher = DefaultHasher::new();
    ip.hash(&mut hasher);
    (hasher.finish() % worker_count as u64) as usize
}
