// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The narrow capability the stream worker drives the radio through.
//!
//! Nothing else in the daemon is allowed to talk to a driver. Hardware
//! backends implement [`SdrDevice`] out of tree; [`ToneSdr`] is the
//! in-tree device, producing a phase-continuous complex tone at a fixed
//! offset from the center frequency.

use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use crate::config::SdrConfig;

/// Driver failure taxonomy.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The operation failed but the driver is still responsive; the
    /// caller counts it and retries.
    #[error("transient driver failure: {0}")]
    Transient(String),
    /// The sample buffer cannot be (re)created; the stream cannot
    /// continue.
    #[error("fatal driver failure: {0}")]
    Fatal(String),
}

/// Capability every radio backend exposes to the stream worker.
///
/// The contract mirrors the streamer's lifecycle: configure, enable the
/// I/Q channels, create one sample buffer, refill it repeatedly, and
/// destroy it around reconfigurations. `refill` blocks for at most one
/// buffer period.
pub trait SdrDevice: Send {
    /// Apply the whole configuration atomically (center frequency,
    /// sample rate, bandwidth, manual-mode gain).
    fn apply_config(&mut self, config: &SdrConfig) -> Result<(), DriverError>;
    /// Enable the receive I and Q channels.
    fn enable_channels(&mut self) -> Result<(), DriverError>;
    /// Create the sample buffer, sized in I/Q pairs.
    fn create_buffer(&mut self, sample_pairs: usize) -> Result<(), DriverError>;
    /// Destroy the sample buffer if one exists.
    fn destroy_buffer(&mut self);
    /// Fill `iq` with interleaved I/Q samples from the buffer. Returns
    /// the number of `i16` values written (twice the pair count).
    fn refill(&mut self, iq: &mut [i16]) -> Result<usize, DriverError>;
}

/// Simulated radio producing a complex tone at one eighth of the sample
/// rate, at 60 % of full scale.
///
/// With pacing on (the default), `refill` sleeps so samples are handed
/// out at the configured rate, like a hardware buffer would. Tests that
/// don't care about real time run it unpaced.
pub struct ToneSdr {
    applied: Option<SdrConfig>,
    buffer_pairs: Option<usize>,
    channels_enabled: bool,
    paced: bool,
    phase: f64,
    next_refill: Option<Instant>,
}

impl ToneSdr {
    /// Real-time paced tone source.
    pub fn new() -> ToneSdr {
        ToneSdr {
            applied: None,
            buffer_pairs: None,
            channels_enabled: false,
            paced: true,
            phase: 0.0,
            next_refill: None,
        }
    }

    /// Tone source that refills as fast as it is asked to.
    pub fn unpaced() -> ToneSdr {
        ToneSdr {
            paced: false,
            ..ToneSdr::new()
        }
    }

    const AMPLITUDE: f64 = 0.6 * i16::MAX as f64;
}

impl Default for ToneSdr {
    fn default() -> Self {
        ToneSdr::new()
    }
}

impl SdrDevice for ToneSdr {
    fn apply_config(&mut self, config: &SdrConfig) -> Result<(), DriverError> {
        debug!(
            "tone sdr: fc={} Hz rate={} sps bw={} Hz gain={} dB",
            config.center_frequency_hz, config.sample_rate_hz, config.bandwidth_hz, config.gain_db
        );
        self.applied = Some(*config);
        self.next_refill = None;
        Ok(())
    }

    fn enable_channels(&mut self) -> Result<(), DriverError> {
        if self.applied.is_none() {
            return Err(DriverError::Transient("no configuration applied".into()));
        }
        self.channels_enabled = true;
        Ok(())
    }

    fn create_buffer(&mut self, sample_pairs: usize) -> Result<(), DriverError> {
        if self.applied.is_none() || !self.channels_enabled {
            return Err(DriverError::Transient(
                "cannot create buffer before configuration".into(),
            ));
        }
        self.buffer_pairs = Some(sample_pairs);
        self.next_refill = None;
        Ok(())
    }

    fn destroy_buffer(&mut self) {
        self.buffer_pairs = None;
        self.next_refill = None;
    }

    fn refill(&mut self, iq: &mut [i16]) -> Result<usize, DriverError> {
        let config = self
            .applied
            .ok_or_else(|| DriverError::Transient("no configuration applied".into()))?;
        let capacity = self
            .buffer_pairs
            .ok_or_else(|| DriverError::Transient("no sample buffer".into()))?;
        let pairs = capacity.min(iq.len() / 2);

        if self.paced {
            let period = Duration::from_secs_f64(pairs as f64 / config.sample_rate_hz as f64);
            let now = Instant::now();
            let due = match self.next_refill {
                Some(due) => due,
                None => now,
            };
            if due > now {
                std::thread::sleep(due - now);
            }
            // Schedule the next refill one period on, without building up
            // debt after a stall.
            let floor = now.checked_sub(period).unwrap_or(now);
            self.next_refill = Some(due.max(floor) + period);
        }

        let step = TAU / 8.0;
        for pair in iq[..pairs * 2].chunks_exact_mut(2) {
            pair[0] = (Self::AMPLITUDE * self.phase.cos()) as i16;
            pair[1] = (Self::AMPLITUDE * self.phase.sin()) as i16;
            self.phase = (self.phase + step) % TAU;
        }
        Ok(pairs * 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_requires_config_and_buffer() {
        let mut sdr = ToneSdr::unpaced();
        let mut iq = [0i16; 64];
        assert!(matches!(
            sdr.refill(&mut iq),
            Err(DriverError::Transient(_))
        ));

        sdr.apply_config(&SdrConfig::default()).unwrap();
        sdr.enable_channels().unwrap();
        assert!(matches!(
            sdr.refill(&mut iq),
            Err(DriverError::Transient(_))
        ));

        sdr.create_buffer(32).unwrap();
        assert_eq!(sdr.refill(&mut iq).unwrap(), 64);

        sdr.destroy_buffer();
        assert!(sdr.refill(&mut iq).is_err());
    }

    #[test]
    fn tone_is_phase_continuous_across_refills() {
        let mut sdr = ToneSdr::unpaced();
        sdr.apply_config(&SdrConfig::default()).unwrap();
        sdr.enable_channels().unwrap();
        sdr.create_buffer(8).unwrap();

        let mut first = [0i16; 16];
        let mut second = [0i16; 16];
        sdr.refill(&mut first).unwrap();
        sdr.refill(&mut second).unwrap();
        // Eight samples per cycle: the second refill repeats the first.
        assert_eq!(first, second);
        // Quarter-cycle offset between I and Q.
        assert_eq!(first[0], (ToneSdr::AMPLITUDE) as i16);
        assert_eq!(first[1], 0);
        assert_eq!(first[4], 0);
        assert_eq!(first[5], (ToneSdr::AMPLITUDE) as i16);
    }
}
