// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The bounded subscriber registry.
//!
//! A flat, 16-slot table guarded by one lock. The control worker
//! inserts and reactivates entries; the stream worker updates health on
//! every fan-out and compacts dead entries away. History survives
//! deactivation: a subscriber that re-registers gets its counters back.

use std::io;
use std::net::{SocketAddrV4, UdpSocket};

use log::{debug, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

/// Hard cap on concurrently registered subscribers.
pub const MAX_SUBSCRIBERS: usize = 16;
/// Consecutive send failures after which a subscriber is deactivated.
pub const MAX_CONSECUTIVE_FAILURES: u16 = 10;
/// A subscriber unseen for this long is compacted out.
pub const SUBSCRIBER_TIMEOUT_US: u64 = 30_000_000;

/// Per-subscriber record. `addr` is the identity and never changes
/// after insertion.
#[derive(Copy, Clone, Debug)]
pub struct Subscriber {
    /// Destination for data and context packets.
    pub addr: SocketAddrV4,
    /// False schedules the entry for removal at the next compaction.
    pub active: bool,
    /// Send failures since the last success.
    pub consecutive_failures: u16,
    /// Send failures over the entry's whole life.
    pub total_failures: u64,
    /// Packets delivered.
    pub packets_sent: u64,
    /// Bytes delivered.
    pub bytes_sent: u64,
    /// When the entry was first registered.
    pub first_seen_us: u64,
    /// Last successful send or (re-)registration.
    pub last_seen_us: u64,
}

/// Why a registration was refused.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// All slots hold live subscribers; existing entries are never
    /// evicted to make room.
    #[error("subscriber registry full ({MAX_SUBSCRIBERS} entries)")]
    Full,
}

/// What a registration did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new entry was appended.
    Added,
    /// An inactive entry for the address was restored in place.
    Reactivated,
    /// The address was already active; treated as a keepalive.
    AlreadyActive,
}

/// Totals for one fan-out pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Subscribers the datagram reached.
    pub delivered: usize,
    /// Subscribers whose send failed.
    pub failed: usize,
}

/// Thread-safe, fixed-capacity subscriber table.
pub struct SubscriberRegistry {
    entries: Mutex<Vec<Subscriber>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> SubscriberRegistry {
        SubscriberRegistry {
            entries: Mutex::new(Vec::with_capacity(MAX_SUBSCRIBERS)),
        }
    }

    /// Register `addr`, reactivating a dead entry in place if one
    /// exists. Re-registration acts as a keepalive.
    pub fn register(
        &self,
        addr: SocketAddrV4,
        now_us: u64,
    ) -> Result<RegisterOutcome, RegistryError> {
        let mut entries = self.entries.lock();
        if let Some(sub) = entries.iter_mut().find(|s| s.addr == addr) {
            sub.last_seen_us = now_us;
            if sub.active {
                return Ok(RegisterOutcome::AlreadyActive);
            }
            sub.active = true;
            sub.consecutive_failures = 0;
            info!("subscriber {addr} reactivated");
            return Ok(RegisterOutcome::Reactivated);
        }
        if entries.len() >= MAX_SUBSCRIBERS {
            return Err(RegistryError::Full);
        }
        entries.push(Subscriber {
            addr,
            active: true,
            consecutive_failures: 0,
            total_failures: 0,
            packets_sent: 0,
            bytes_sent: 0,
            first_seen_us: now_us,
            last_seen_us: now_us,
        });
        info!("subscriber {addr} registered ({}/{MAX_SUBSCRIBERS})", entries.len());
        Ok(RegisterOutcome::Added)
    }

    /// Send `buf` to every active subscriber through `socket`.
    pub fn broadcast(&self, socket: &UdpSocket, buf: &[u8], now_us: u64) -> BroadcastOutcome {
        self.broadcast_with(now_us, |addr| socket.send_to(buf, addr))
    }

    /// Fan-out core with the send operation abstracted away. Updates the
    /// health state of every active entry: success clears consecutive
    /// failures and refreshes `last_seen_us`; enough consecutive failures
    /// deactivate the entry.
    pub fn broadcast_with<F>(&self, now_us: u64, mut send: F) -> BroadcastOutcome
    where
        F: FnMut(&SocketAddrV4) -> io::Result<usize>,
    {
        let mut outcome = BroadcastOutcome::default();
        let mut entries = self.entries.lock();
        for sub in entries.iter_mut().filter(|s| s.active) {
            match send(&sub.addr) {
                Ok(bytes) => {
                    sub.packets_sent += 1;
                    sub.bytes_sent += bytes as u64;
                    sub.consecutive_failures = 0;
                    sub.last_seen_us = now_us;
                    outcome.delivered += 1;
                }
                Err(e) => {
                    sub.consecutive_failures += 1;
                    sub.total_failures += 1;
                    outcome.failed += 1;
                    if sub.total_failures % 10 == 0 {
                        warn!(
                            "subscriber {}: {} send failures ({e})",
                            sub.addr, sub.total_failures
                        );
                    }
                    if sub.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        info!(
                            "subscriber {} deactivated after {} consecutive send failures",
                            sub.addr, sub.consecutive_failures
                        );
                        sub.active = false;
                    }
                }
            }
        }
        outcome
    }

    /// Drop inactive and stale entries, keeping live ones contiguous.
    /// Returns how many entries were removed.
    pub fn compact(&self, now_us: u64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|sub| {
            let stale = now_us.saturating_sub(sub.last_seen_us) > SUBSCRIBER_TIMEOUT_US;
            if !sub.active {
                debug!("compacting inactive subscriber {}", sub.addr);
            } else if stale {
                debug!("compacting stale subscriber {}", sub.addr);
            }
            sub.active && !stale
        });
        before - entries.len()
    }

    /// Number of active subscribers.
    pub fn active_count(&self) -> usize {
        self.entries.lock().iter().filter(|s| s.active).count()
    }

    /// Copy of the current table, for telemetry.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.entries.lock().clone()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        SubscriberRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(n: u8) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, n), 4991)
    }

    fn fail() -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "unreachable"))
    }

    #[test]
    fn cap_is_sixteen_and_extras_are_refused() {
        let reg = SubscriberRegistry::new();
        for n in 1..=20 {
            let result = reg.register(addr(n), 1);
            if n <= 16 {
                assert_eq!(result, Ok(RegisterOutcome::Added));
            } else {
                assert_eq!(result, Err(RegistryError::Full));
            }
        }
        assert_eq!(reg.active_count(), 16);
        // The first sixteen are undisturbed.
        let snapshot = reg.snapshot();
        assert_eq!(snapshot.len(), 16);
        for (i, sub) in snapshot.iter().enumerate() {
            assert_eq!(sub.addr, addr(i as u8 + 1));
            assert!(sub.active);
        }
    }

    #[test]
    fn eviction_after_consecutive_failures() {
        let reg = SubscriberRegistry::new();
        reg.register(addr(1), 0).unwrap();

        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            let outcome = reg.broadcast_with(0, |_| fail());
            assert_eq!(outcome.failed, 1);
        }
        let sub = reg.snapshot()[0];
        assert!(!sub.active);
        assert_eq!(sub.consecutive_failures, MAX_CONSECUTIVE_FAILURES);
        assert_eq!(sub.total_failures, MAX_CONSECUTIVE_FAILURES as u64);

        // Inactive entries are skipped by further fan-outs and removed
        // by compaction.
        let outcome = reg.broadcast_with(0, |_| fail());
        assert_eq!(outcome, BroadcastOutcome::default());
        assert_eq!(reg.compact(0), 1);
        assert!(reg.snapshot().is_empty());
    }

    #[test]
    fn reactivation_preserves_history() {
        let reg = SubscriberRegistry::new();
        reg.register(addr(1), 100).unwrap();
        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            reg.broadcast_with(200, |_| fail());
        }
        assert!(!reg.snapshot()[0].active);

        assert_eq!(
            reg.register(addr(1), 300),
            Ok(RegisterOutcome::Reactivated)
        );
        let sub = reg.snapshot()[0];
        assert!(sub.active);
        assert_eq!(sub.consecutive_failures, 0);
        assert_eq!(sub.total_failures, MAX_CONSECUTIVE_FAILURES as u64);
        assert_eq!(sub.first_seen_us, 100);
        assert_eq!(sub.last_seen_us, 300);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let reg = SubscriberRegistry::new();
        reg.register(addr(1), 0).unwrap();
        for _ in 0..5 {
            reg.broadcast_with(10, |_| fail());
        }
        assert_eq!(reg.snapshot()[0].consecutive_failures, 5);

        let outcome = reg.broadcast_with(20, |_| Ok(1472));
        assert_eq!(outcome.delivered, 1);
        let sub = reg.snapshot()[0];
        assert_eq!(sub.consecutive_failures, 0);
        assert_eq!(sub.total_failures, 5);
        assert_eq!(sub.packets_sent, 1);
        assert_eq!(sub.bytes_sent, 1472);
        assert_eq!(sub.last_seen_us, 20);
    }

    #[test]
    fn stale_entries_compact_out() {
        let reg = SubscriberRegistry::new();
        reg.register(addr(1), 0).unwrap();
        reg.register(addr(2), 0).unwrap();
        // addr(1) keeps receiving; addr(2) goes quiet but stays "active"
        // because its sends keep succeeding silently. Simulate by only
        // refreshing addr(1).
        let target = addr(1);
        reg.broadcast_with(SUBSCRIBER_TIMEOUT_US, |a| {
            if *a == target {
                Ok(100)
            } else {
                fail()
            }
        });
        let removed = reg.compact(SUBSCRIBER_TIMEOUT_US + 1);
        assert_eq!(removed, 1);
        let snapshot = reg.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].addr, addr(1));
    }

    #[test]
    fn keepalive_refreshes_last_seen() {
        let reg = SubscriberRegistry::new();
        reg.register(addr(1), 0).unwrap();
        assert_eq!(
            reg.register(addr(1), 500),
            Ok(RegisterOutcome::AlreadyActive)
        );
        assert_eq!(reg.snapshot()[0].last_seen_us, 500);
    }
}
