// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The stream worker: the single sample producer and packet multicaster.
//!
//! One loop iteration polls the configuration store, refills the sample
//! buffer, checks refill timing against the sample clock, emits the
//! periodic context packet, slices the buffer into MTU-sized data
//! packets, and fans them out. All encoding goes through one reusable
//! scratch buffer sized to the link; nothing on the hot path allocates
//! once the payload capacity is warm.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use thiserror::Error;
use vrt49::prelude::*;
use vrt49::StateEvents;

use crate::config::{ConfigStore, SdrConfig};
use crate::mtu;
use crate::sdr::{DriverError, SdrDevice};
use crate::stats::StreamStats;
use crate::streamer::Streamer;

/// How often the configuration store is polled for dirtiness.
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Data packets between periodic context packets.
pub const CONTEXT_INTERVAL_PACKETS: u64 = 100;
/// Data packets between registry compaction passes.
const COMPACT_INTERVAL_PACKETS: u64 = 100;
/// Refill timing slack before a gap counts as a jump, in µs.
const GAP_THRESHOLD_US: i64 = 10_000;
/// I/Q pairs per buffer refill.
pub const REFILL_SAMPLE_PAIRS: usize = 8192;
/// Back-off after a failed refill.
const REFILL_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Stream worker lifecycle states.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum StreamState {
    Init,
    Streaming,
    Reconfiguring,
    Stopped,
}

/// How a worker run ended, split by lifecycle phase so the supervisor
/// can map it to the right exit code.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The driver never came up.
    #[error("driver bring-up failed: {0}")]
    Init(DriverError),
    /// The sample buffer was lost mid-stream and could not be rebuilt.
    #[error("stream failed: {0}")]
    Runtime(DriverError),
}

/// What a configuration poll did to the hardware.
#[derive(Debug)]
pub(crate) enum ReconfigOutcome {
    /// Store was clean; nothing happened.
    Unchanged,
    /// The new configuration is live.
    Applied(SdrConfig),
    /// The new configuration failed; the previous one was restored.
    RolledBack(SdrConfig),
}

pub(crate) struct StreamWorker {
    shared: Arc<Streamer>,
    dev: Box<dyn SdrDevice>,
    /// Encode target, sized to the largest datagram the link carries.
    scratch: Vec<u8>,
    /// Refill target, interleaved I/Q.
    iq: Vec<i16>,
    /// Reused across packets so the payload allocation stays warm.
    data_packet: Vrt,
    applied: SdrConfig,
    samples_per_packet: usize,
    data_count: u8,
    context_count: u8,
    packets_since_context: u64,
    packets_since_compact: u64,
    last_config_poll: Instant,
    state: StreamState,
}

impl StreamWorker {
    pub(crate) fn new(shared: Arc<Streamer>, dev: Box<dyn SdrDevice>) -> StreamWorker {
        let mut data_packet = Vrt::new_signal_data_packet();
        data_packet.set_stream_id(Some(shared.options.stream_id));
        data_packet.set_trailer(Some(Trailer::new_valid_data()));
        let scratch = vec![0u8; mtu::max_datagram_bytes(shared.options.mtu)];
        let samples_per_packet = mtu::samples_per_packet(shared.options.mtu);
        let applied = shared.config.current();
        StreamWorker {
            shared,
            dev,
            scratch,
            iq: vec![0i16; REFILL_SAMPLE_PAIRS * 2],
            data_packet,
            applied,
            samples_per_packet,
            data_count: 0,
            context_count: 0,
            packets_since_context: 0,
            packets_since_compact: 0,
            last_config_poll: Instant::now(),
            state: StreamState::Init,
        }
    }

    /// Bring the driver up, then stream until shutdown or a fatal
    /// buffer loss.
    pub(crate) fn run(mut self) -> Result<(), WorkerError> {
        self.init().map_err(WorkerError::Init)?;
        self.set_state(StreamState::Streaming);
        // Tell subscribers-to-be what they'll be getting before the
        // first data packet.
        self.emit_context(self.applied);

        let result = loop {
            if !self.shared.is_running() {
                break Ok(());
            }
            match self.iteration() {
                Ok(()) => {}
                Err(e) => break Err(WorkerError::Runtime(e)),
            }
        };
        self.dev.destroy_buffer();
        self.set_state(StreamState::Stopped);
        result
    }

    fn init(&mut self) -> Result<(), DriverError> {
        let config = self.shared.config.current();
        self.dev.apply_config(&config)?;
        self.dev.enable_channels()?;
        self.dev.create_buffer(REFILL_SAMPLE_PAIRS)?;
        self.applied = config;
        info!(
            "streaming at fc={} Hz rate={} sps bw={} Hz gain={} dB",
            config.center_frequency_hz, config.sample_rate_hz, config.bandwidth_hz, config.gain_db
        );
        Ok(())
    }

    fn set_state(&mut self, next: StreamState) {
        if self.state != next {
            debug!("stream worker: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// One pass of the main loop.
    fn iteration(&mut self) -> Result<(), DriverError> {
        let started = Instant::now();

        // 1. Configuration poll at a bounded cadence.
        if self.last_config_poll.elapsed() >= CONFIG_POLL_INTERVAL {
            self.last_config_poll = Instant::now();
            self.poll_config()?;
        }

        // 2. Refill. Failures are counted and retried, never fatal.
        let filled = match self.dev.refill(&mut self.iq) {
            Ok(filled) => filled,
            Err(DriverError::Transient(e)) => {
                self.shared.stats.refill_failures.fetch_add(1, Ordering::Relaxed);
                warn!("refill failed: {e}");
                thread::sleep(REFILL_RETRY_DELAY);
                return Ok(());
            }
            Err(fatal) => return Err(fatal),
        };

        // 3. Refill timing against the sample clock.
        note_refill(
            &self.shared.stats,
            filled / 2,
            self.applied.sample_rate_hz,
            self.shared.now_us(),
        );

        // 4. Periodic context.
        if self.packets_since_context >= CONTEXT_INTERVAL_PACKETS {
            self.emit_context(self.applied);
        }

        // 5. Packetize and fan out.
        let filled = filled - (filled % 2);
        if let Err(e) = self.send_data(filled) {
            error!("data packet encode failed: {e}");
        }

        // 6. Compaction.
        if self.packets_since_compact >= COMPACT_INTERVAL_PACKETS {
            self.packets_since_compact = 0;
            self.shared.registry.compact(self.shared.now_us());
        }

        // 7. Loop timing.
        self.shared
            .stats
            .record_loop(started.elapsed().as_micros() as u64);
        Ok(())
    }

    /// Observe the dirty flag and drive the hardware reconfiguration.
    /// The context packet announcing the change goes out strictly after
    /// the hardware applies it and strictly before the next data packet.
    fn poll_config(&mut self) -> Result<(), DriverError> {
        let (_, dirty) = self.shared.config.snapshot();
        if !dirty {
            return Ok(());
        }
        self.set_state(StreamState::Reconfiguring);
        let outcome = apply_reconfig(
            self.dev.as_mut(),
            &self.shared.config,
            &self.applied,
            REFILL_SAMPLE_PAIRS,
        )?;
        match outcome {
            ReconfigOutcome::Unchanged => {}
            ReconfigOutcome::Applied(config) => {
                self.applied = config;
                self.shared.stats.reconfigs.fetch_add(1, Ordering::Relaxed);
                self.emit_context(config);
            }
            ReconfigOutcome::RolledBack(config) => {
                self.applied = config;
                self.emit_context(config);
            }
        }
        self.set_state(StreamState::Streaming);
        Ok(())
    }

    /// Slice `filled` refilled samples into data packets and broadcast
    /// each. The last chunk may be short.
    fn send_data(&mut self, filled: usize) -> Result<(), VrtError> {
        let chunk_len = self.samples_per_packet * 2;
        for start in (0..filled).step_by(chunk_len) {
            let end = filled.min(start + chunk_len);
            let (secs, ps) = utc_timestamp();
            self.data_packet.header_mut().set_packet_count(self.data_count);
            self.data_count = (self.data_count + 1) & 0xF;
            self.data_packet.set_integer_timestamp(Some(secs), Tsi::Utc)?;
            self.data_packet
                .set_fractional_timestamp(Some(ps), Tsf::RealTimePs)?;
            self.data_packet.set_signal_samples(&self.iq[start..end])?;
            let len = self.data_packet.encode_into(&mut self.scratch)?;

            let outcome = self.shared.registry.broadcast(
                self.shared.data_socket(),
                &self.scratch[..len],
                self.shared.now_us(),
            );
            let stats = &self.shared.stats;
            stats
                .packets_sent
                .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
            stats
                .bytes_sent
                .fetch_add((outcome.delivered * len) as u64, Ordering::Relaxed);
            stats
                .send_failures
                .fetch_add(outcome.failed as u64, Ordering::Relaxed);
            self.packets_since_context += 1;
            self.packets_since_compact += 1;
        }
        Ok(())
    }

    /// Encode and broadcast a context packet describing `config` and the
    /// current buffer health.
    fn emit_context(&mut self, config: SdrConfig) {
        let packet = match build_context_packet(
            &config,
            &self.shared.stats,
            self.shared.options.stream_id,
            self.context_count,
        ) {
            Ok(packet) => packet,
            Err(e) => {
                error!("context packet build failed: {e}");
                return;
            }
        };
        self.context_count = (self.context_count + 1) & 0xF;
        match packet.encode_into(&mut self.scratch) {
            Ok(len) => {
                self.shared.registry.broadcast(
                    self.shared.data_socket(),
                    &self.scratch[..len],
                    self.shared.now_us(),
                );
                self.shared
                    .stats
                    .contexts_sent
                    .fetch_add(1, Ordering::Relaxed);
                self.packets_since_context = 0;
            }
            Err(e) => error!("context packet encode failed: {e}"),
        }
    }
}

/// Seconds and picoseconds of UTC now, for packet timestamps.
fn utc_timestamp() -> (u32, u64) {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => (elapsed.as_secs() as u32, elapsed.subsec_nanos() as u64 * 1000),
        Err(_) => (0, 0),
    }
}

/// Compare the wall time between refills against the time the samples
/// represent. A refill arriving late is an underflow (the driver fell
/// behind real time); early is an overflow.
pub(crate) fn note_refill(
    stats: &StreamStats,
    sample_pairs: usize,
    sample_rate_hz: u32,
    now_us: u64,
) {
    let last = stats
        .last_refill_timestamp_us
        .swap(now_us, Ordering::Relaxed);
    if last == 0 {
        return;
    }
    let expected_us = sample_pairs as u64 * 1_000_000 / sample_rate_hz.max(1) as u64;
    let actual_us = now_us.saturating_sub(last);
    let delta_us = actual_us as i64 - expected_us as i64;
    if delta_us.abs() > GAP_THRESHOLD_US {
        stats.timestamp_jumps.fetch_add(1, Ordering::Relaxed);
        if delta_us > 0 {
            stats.underflows.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.overflows.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Destroy, retune, and rebuild the sample buffer for the store's
/// current target. On failure the previous configuration is restored;
/// if even that buffer cannot be rebuilt, the stream is lost.
///
/// The dirty flag is cleared in every non-fatal case, so a target the
/// hardware rejected is not retried forever.
pub(crate) fn apply_reconfig(
    dev: &mut dyn SdrDevice,
    store: &ConfigStore,
    previous: &SdrConfig,
    buffer_pairs: usize,
) -> Result<ReconfigOutcome, DriverError> {
    let (target, dirty) = store.snapshot();
    if !dirty {
        return Ok(ReconfigOutcome::Unchanged);
    }

    info!(
        "reconfiguring: fc={} Hz rate={} sps bw={} Hz gain={} dB",
        target.center_frequency_hz, target.sample_rate_hz, target.bandwidth_hz, target.gain_db
    );
    dev.destroy_buffer();
    let result = dev
        .apply_config(&target)
        .and_then(|()| dev.create_buffer(buffer_pairs));
    match result {
        Ok(()) => {
            store.clear_dirty();
            Ok(ReconfigOutcome::Applied(target))
        }
        Err(e) => {
            warn!("reconfigure failed, restoring previous configuration: {e}");
            dev.apply_config(previous)
                .and_then(|()| dev.create_buffer(buffer_pairs))
                .map_err(|e| {
                    DriverError::Fatal(format!("buffer lost after failed reconfigure: {e}"))
                })?;
            store.clear_dirty();
            Ok(ReconfigOutcome::RolledBack(*previous))
        }
    }
}

/// A context packet carrying `config` plus state/event health bits.
pub(crate) fn build_context_packet(
    config: &SdrConfig,
    stats: &StreamStats,
    stream_id: u32,
    count: u8,
) -> Result<Vrt, VrtError> {
    let mut packet = Vrt::new_context_packet();
    packet.set_stream_id(Some(stream_id));
    packet.header_mut().set_packet_count(count & 0xF);
    let (secs, ps) = utc_timestamp();
    packet.set_integer_timestamp(Some(secs), Tsi::Utc)?;
    packet.set_fractional_timestamp(Some(ps), Tsf::RealTimePs)?;

    let context = packet.payload_mut().context_mut()?;
    context.set_bandwidth_hz(Some(config.bandwidth_hz as f64));
    context.set_rf_ref_freq_hz(Some(config.center_frequency_hz as f64));
    context.set_gain_db(Some(config.gain_db));
    context.set_sample_rate_sps(Some(config.sample_rate_hz as f64));
    let mut indicators = StateEvents::new();
    indicators.set_calibrated_time(true);
    indicators.set_over_range(stats.overflows.load(Ordering::Relaxed) > 0);
    indicators.set_sample_loss(stats.underflows.load(Ordering::Relaxed) > 0);
    context.set_state_and_event(Some(indicators));
    packet.update_packet_size();
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigUpdate;
    use crate::sdr::ToneSdr;
    use crate::streamer::StreamerOptions;

    /// Driver double that records the order of operations and fails on
    /// request.
    #[derive(Default)]
    struct ScriptedSdr {
        ops: Vec<String>,
        fail_apply_for: Option<u64>,
        fail_create: bool,
    }

    impl SdrDevice for ScriptedSdr {
        fn apply_config(&mut self, config: &SdrConfig) -> Result<(), DriverError> {
            self.ops.push(format!("apply:{}", config.center_frequency_hz));
            if self.fail_apply_for == Some(config.center_frequency_hz) {
                return Err(DriverError::Transient("attribute write failed".into()));
            }
            Ok(())
        }
        fn enable_channels(&mut self) -> Result<(), DriverError> {
            self.ops.push("enable".into());
            Ok(())
        }
        fn create_buffer(&mut self, _sample_pairs: usize) -> Result<(), DriverError> {
            self.ops.push("create".into());
            if self.fail_create {
                return Err(DriverError::Transient("buffer allocation failed".into()));
            }
            Ok(())
        }
        fn destroy_buffer(&mut self) {
            self.ops.push("destroy".into());
        }
        fn refill(&mut self, iq: &mut [i16]) -> Result<usize, DriverError> {
            iq.fill(0);
            Ok(iq.len())
        }
    }

    fn dirty_store(freq_hz: u64) -> ConfigStore {
        let store = ConfigStore::new(SdrConfig::default());
        store.apply_update(&ConfigUpdate {
            center_frequency_hz: Some(freq_hz),
            ..ConfigUpdate::default()
        });
        store
    }

    #[test]
    fn gap_checks_classify_underflow_and_overflow() {
        let stats = StreamStats::new();
        // 65536 pairs at 2.084 MSPS: one buffer is 31 446 µs of signal.
        let expected = 65536u64 * 1_000_000 / 2_084_000;

        // First refill only seeds the timestamp.
        let t0 = 1_000_000;
        note_refill(&stats, 65536, 2_084_000, t0);
        assert_eq!(stats.timestamp_jumps.load(Ordering::Relaxed), 0);

        // On-time refill: no jump.
        let t1 = t0 + expected;
        note_refill(&stats, 65536, 2_084_000, t1);
        assert_eq!(stats.timestamp_jumps.load(Ordering::Relaxed), 0);

        // 20 ms late: underflow.
        let t2 = t1 + expected + 20_000;
        note_refill(&stats, 65536, 2_084_000, t2);
        assert_eq!(stats.timestamp_jumps.load(Ordering::Relaxed), 1);
        assert_eq!(stats.underflows.load(Ordering::Relaxed), 1);
        assert_eq!(stats.overflows.load(Ordering::Relaxed), 0);

        // Near-instant re-delivery of a whole buffer: overflow.
        let t3 = t2 + 1_000;
        note_refill(&stats, 65536, 2_084_000, t3);
        assert_eq!(stats.timestamp_jumps.load(Ordering::Relaxed), 2);
        assert_eq!(stats.underflows.load(Ordering::Relaxed), 1);
        assert_eq!(stats.overflows.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn context_packet_reflects_config_and_health() {
        let stats = StreamStats::new();
        stats.underflows.fetch_add(3, Ordering::Relaxed);
        let config = SdrConfig {
            center_frequency_hz: 103_700_000,
            sample_rate_hz: 2_084_000,
            bandwidth_hz: 1_600_000,
            gain_db: 40.0,
        };
        let packet = build_context_packet(&config, &stats, 0x0100_0000, 7).unwrap();
        let parsed = Vrt::parse(&packet.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.stream_id(), Some(0x0100_0000));
        assert_eq!(parsed.header().packet_count(), 7);
        let context = parsed.payload().context().unwrap();
        assert_eq!(context.rf_ref_freq_hz(), Some(103.7e6));
        assert_eq!(context.sample_rate_sps(), Some(2.084e6));
        assert_eq!(context.bandwidth_hz(), Some(1.6e6));
        assert_eq!(context.gain_db(), Some(40.0));
        let indicators = context.state_and_event().unwrap();
        assert!(indicators.calibrated_time());
        assert!(indicators.sample_loss());
        assert!(!indicators.over_range());
    }

    #[test]
    fn reconfigure_rebuilds_buffer_and_clears_dirty() {
        let mut dev = ScriptedSdr::default();
        let store = dirty_store(2_400_000_000);
        let previous = SdrConfig::default();
        let outcome =
            apply_reconfig(&mut dev, &store, &previous, REFILL_SAMPLE_PAIRS).unwrap();
        assert!(matches!(outcome, ReconfigOutcome::Applied(c) if c.center_frequency_hz == 2_400_000_000));
        assert_eq!(dev.ops, vec!["destroy", "apply:2400000000", "create"]);
        assert!(!store.snapshot().1);

        // Clean store: nothing to do.
        let outcome =
            apply_reconfig(&mut dev, &store, &previous, REFILL_SAMPLE_PAIRS).unwrap();
        assert!(matches!(outcome, ReconfigOutcome::Unchanged));
    }

    #[test]
    fn failed_reconfigure_restores_previous_config() {
        let mut dev = ScriptedSdr {
            fail_apply_for: Some(2_400_000_000),
            ..ScriptedSdr::default()
        };
        let store = dirty_store(2_400_000_000);
        let previous = SdrConfig::default();
        let outcome =
            apply_reconfig(&mut dev, &store, &previous, REFILL_SAMPLE_PAIRS).unwrap();
        assert!(matches!(outcome, ReconfigOutcome::RolledBack(c) if c == previous));
        assert_eq!(
            dev.ops,
            vec!["destroy", "apply:2400000000", "apply:100000000", "create"]
        );
        assert!(!store.snapshot().1);
    }

    #[test]
    fn unrecoverable_buffer_loss_is_fatal() {
        let mut dev = ScriptedSdr {
            fail_apply_for: Some(2_400_000_000),
            fail_create: true,
            ..ScriptedSdr::default()
        };
        let store = dirty_store(2_400_000_000);
        let previous = SdrConfig::default();
        let result = apply_reconfig(&mut dev, &store, &previous, REFILL_SAMPLE_PAIRS);
        assert!(matches!(result, Err(DriverError::Fatal(_))));
    }

    #[test]
    fn data_counter_is_contiguous_across_reconfigs() {
        let shared = Streamer::new(StreamerOptions {
            control_port: 0,
            data_bind_port: Some(0),
            ..StreamerOptions::default()
        })
        .unwrap();
        let mut worker = StreamWorker::new(shared, Box::new(ToneSdr::unpaced()));
        worker.init().unwrap();

        // 32 single-packet sends take the 4-bit counter through each
        // value twice, in order.
        for i in 0..32u8 {
            assert_eq!(worker.data_count, i & 0xF);
            worker.send_data(worker.samples_per_packet * 2).unwrap();
        }
        // A context in between must not disturb the data counter.
        worker.emit_context(worker.applied);
        assert_eq!(worker.data_count, 0);
        assert_eq!(
            worker.shared.stats.contexts_sent.load(Ordering::Relaxed),
            1
        );
        // No subscribers: nothing was delivered, nothing failed.
        assert_eq!(worker.shared.stats.packets_sent.load(Ordering::Relaxed), 0);
    }
}
