//! Interface change detection.
//!
//! Change detection is a cheap fingerprint diff: the address set of every
//! non-loopback interface is hashed each poll and compared against the last
//! observation. Only transitions cost anything — an unchanged interface
//! produces zero commands.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::iface::{AddrAssignment, InterfaceProvider};
use crate::route::PolicyRouteManager;

/// Fingerprint of an empty address set. Doubles as the sentinel for
/// "feature disabled": at the fingerprint level, disabling multipath is
/// indistinguishable from every interface losing its addresses.
pub const EMPTY_FINGERPRINT: u64 = 0xcbf2_9ce4_8422_2325;

/// Stable FNV-1a over the sorted `addr/prefix` strings of an address set.
/// Order-insensitive; stable across runs.
pub fn fingerprint(addrs: &[AddrAssignment]) -> u64 {
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut entries: Vec<String> = addrs.iter().map(AddrAssignment::cidr).collect();
    entries.sort_unstable();

    let mut hash = EMPTY_FINGERPRINT;
    for entry in &entries {
        for &b in entry.as_bytes() {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(PRIME);
        }
        // separator so adjacent entries can't alias
        hash ^= 0xff;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Tracks per-interface address-set fingerprints and drives policy-route
/// synthesis when they move.
///
/// Entries are never removed: an interface that vanishes keeps its last
/// fingerprint (and its routing table keeps whatever is in it) until the
/// process exits. Table ids are recomputed deterministically, so a
/// returning interface reconciles on its next transition.
pub struct InterfaceMonitor {
    provider: Arc<dyn InterfaceProvider>,
    routes: Arc<PolicyRouteManager>,
    fingerprints: HashMap<String, u64>,
}

impl InterfaceMonitor {
    pub fn new(provider: Arc<dyn InterfaceProvider>, routes: Arc<PolicyRouteManager>) -> Self {
        Self {
            provider,
            routes,
            fingerprints: HashMap::new(),
        }
    }

    /// Number of tracked interfaces. Loopbacks are never tracked.
    pub fn tracked(&self) -> usize {
        self.fingerprints.len()
    }

    /// Diff every non-loopback interface against its stored fingerprint and
    /// resynthesize policy routes where it moved. Returns true when at least
    /// one interface transitioned.
    ///
    /// With the feature disabled every fingerprint collapses to the empty
    /// sentinel and `setup` receives an empty address list, which tears
    /// installed rules down without re-adding them.
    pub async fn poll(&mut self, enabled: bool) -> bool {
        let mut changed = false;

        for iface in self.provider.interfaces() {
            if iface.is_loopback {
                continue;
            }

            let current = if enabled {
                fingerprint(&iface.addrs)
            } else {
                EMPTY_FINGERPRINT
            };
            let effective: &[AddrAssignment] = if enabled { &iface.addrs } else { &[] };

            match self.fingerprints.get(&iface.name) {
                None => {
                    if current != EMPTY_FINGERPRINT {
                        debug!(iface = %iface.name, "new interface with addresses");
                        self.routes.setup(&iface, effective, false).await;
                    }
                    self.fingerprints.insert(iface.name.clone(), current);
                    changed = true;
                }
                Some(&stored) if stored != current => {
                    info!(iface = %iface.name, "address set changed, resynthesizing routes");
                    self.routes.setup(&iface, effective, true).await;
                    self.fingerprints.insert(iface.name.clone(), current);
                    changed = true;
                }
                Some(_) => {}
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str, prefix: u8) -> AddrAssignment {
        AddrAssignment::new(s.parse().unwrap(), prefix)
    }

    #[test]
    fn empty_set_hashes_to_sentinel() {
        assert_eq!(fingerprint(&[]), EMPTY_FINGERPRINT);
    }

    #[test]
    fn order_does_not_matter() {
        let a = addr("192.168.1.50", 24);
        let b = addr("10.0.0.2", 8);
        assert_eq!(fingerprint(&[a, b]), fingerprint(&[b, a]));
    }

    #[test]
    fn different_sets_differ() {
        let a = addr("192.168.1.50", 24);
        let b = addr("192.168.1.51", 24);
        assert_ne!(fingerprint(&[a]), fingerprint(&[b]));
        assert_ne!(fingerprint(&[a]), fingerprint(&[a, b]));
        assert_ne!(fingerprint(&[a]), EMPTY_FINGERPRINT);
    }

    #[test]
    fn prefix_length_is_part_of_the_set() {
        let a = addr("192.168.1.50", 24);
        let b = addr("192.168.1.50", 16);
        assert_ne!(fingerprint(&[a]), fingerprint(&[b]));
    }
}
