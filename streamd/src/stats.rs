// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stream statistics (lock-free atomic updates).
//!
//! The stream worker owns the writes; the supervisor reads relaxed
//! snapshots for its periodic report. Individual counters are single
//! words, so a reader can never observe a torn value.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters the stream worker maintains and the supervisor reports.
#[derive(Debug)]
pub struct StreamStats {
    /// Data packets delivered to subscribers (one count per subscriber
    /// reached).
    pub packets_sent: AtomicU64,
    /// Data bytes delivered to subscribers.
    pub bytes_sent: AtomicU64,
    /// Context packets emitted.
    pub contexts_sent: AtomicU64,
    /// Completed hardware reconfigurations.
    pub reconfigs: AtomicU64,
    /// Per-subscriber send failures.
    pub send_failures: AtomicU64,

    /// Refills that arrived late against the sample clock.
    pub underflows: AtomicU64,
    /// Refills that arrived early against the sample clock.
    pub overflows: AtomicU64,
    /// Refills the driver failed outright.
    pub refill_failures: AtomicU64,
    /// Refill timing discontinuities in either direction.
    pub timestamp_jumps: AtomicU64,

    /// Shortest loop iteration seen, in µs.
    pub min_loop_us: AtomicU64,
    /// Longest loop iteration seen, in µs.
    pub max_loop_us: AtomicU64,
    /// Cumulative loop time, in µs.
    pub total_loop_us: AtomicU64,
    /// Loop iterations completed.
    pub loop_iterations: AtomicU64,

    /// When the buffer was last refilled, for gap detection. Zero until
    /// the first refill.
    pub last_refill_timestamp_us: AtomicU64,
}

impl StreamStats {
    /// Fresh, zeroed counters.
    pub fn new() -> StreamStats {
        StreamStats {
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            contexts_sent: AtomicU64::new(0),
            reconfigs: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            underflows: AtomicU64::new(0),
            overflows: AtomicU64::new(0),
            refill_failures: AtomicU64::new(0),
            timestamp_jumps: AtomicU64::new(0),
            min_loop_us: AtomicU64::new(u64::MAX),
            max_loop_us: AtomicU64::new(0),
            total_loop_us: AtomicU64::new(0),
            loop_iterations: AtomicU64::new(0),
            last_refill_timestamp_us: AtomicU64::new(0),
        }
    }

    /// Fold one loop iteration's duration into the timing aggregates.
    pub fn record_loop(&self, loop_us: u64) {
        self.min_loop_us.fetch_min(loop_us, Ordering::Relaxed);
        self.max_loop_us.fetch_max(loop_us, Ordering::Relaxed);
        self.total_loop_us.fetch_add(loop_us, Ordering::Relaxed);
        self.loop_iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean loop time in µs, zero before the first iteration.
    pub fn mean_loop_us(&self) -> u64 {
        let iterations = self.loop_iterations.load(Ordering::Relaxed);
        if iterations == 0 {
            return 0;
        }
        self.total_loop_us.load(Ordering::Relaxed) / iterations
    }
}

impl Default for StreamStats {
    fn default() -> Self {
        StreamStats::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_timing_aggregates() {
        let stats = StreamStats::new();
        assert_eq!(stats.mean_loop_us(), 0);
        for us in [120, 80, 400] {
            stats.record_loop(us);
        }
        assert_eq!(stats.min_loop_us.load(Ordering::Relaxed), 80);
        assert_eq!(stats.max_loop_us.load(Ordering::Relaxed), 400);
        assert_eq!(stats.total_loop_us.load(Ordering::Relaxed), 600);
        assert_eq!(stats.loop_iterations.load(Ordering::Relaxed), 3);
        assert_eq!(stats.mean_loop_us(), 200);
    }
}
