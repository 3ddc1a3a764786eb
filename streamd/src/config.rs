// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The radio configuration record and the process-wide store the two
//! workers share.
//!
//! The control worker writes validated updates and raises the dirty
//! flag; the stream worker polls, applies the snapshot to hardware, and
//! clears it. The lock is held only for field reads/writes, never
//! across I/O.

use parking_lot::Mutex;
use thiserror::Error;

/// Lowest tunable center frequency.
pub const MIN_FREQ_HZ: u64 = 70_000_000;
/// Highest tunable center frequency.
pub const MAX_FREQ_HZ: u64 = 6_000_000_000;
/// Lowest supported sample rate.
pub const MIN_RATE_SPS: u32 = 2_084_000;
/// Highest supported sample rate.
pub const MAX_RATE_SPS: u32 = 61_440_000;
/// Lowest supported RX gain.
pub const MIN_GAIN_DB: f64 = 0.0;
/// Highest supported RX gain.
pub const MAX_GAIN_DB: f64 = 77.0;

/// One atomic snapshot of the radio parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SdrConfig {
    /// RX center frequency in Hz.
    pub center_frequency_hz: u64,
    /// Sample rate in samples per second.
    pub sample_rate_hz: u32,
    /// Analog bandwidth in Hz. Never wider than the sample rate.
    pub bandwidth_hz: u32,
    /// RX gain in dB (manual gain mode).
    pub gain_db: f64,
}

/// Reasons a proposed configuration is rejected before it ever reaches
/// the hardware.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Center frequency outside the tunable range.
    #[error("center frequency {0} Hz outside {MIN_FREQ_HZ}..={MAX_FREQ_HZ} Hz")]
    FrequencyOutOfRange(u64),
    /// Sample rate outside the supported range.
    #[error("sample rate {0} sps outside {MIN_RATE_SPS}..={MAX_RATE_SPS} sps")]
    SampleRateOutOfRange(u32),
    /// Gain outside the supported range.
    #[error("gain {0} dB outside {MIN_GAIN_DB}..={MAX_GAIN_DB} dB")]
    GainOutOfRange(f64),
    /// Bandwidth wider than the sample rate.
    #[error("bandwidth {bandwidth_hz} Hz exceeds sample rate {sample_rate_hz} sps")]
    BandwidthExceedsRate {
        /// Proposed bandwidth.
        bandwidth_hz: u32,
        /// Sample rate it would pair with.
        sample_rate_hz: u32,
    },
}

impl SdrConfig {
    /// The conventional analog bandwidth for a sample rate: 80 % of it.
    pub fn default_bandwidth(sample_rate_hz: u32) -> u32 {
        (sample_rate_hz / 10) * 8
    }

    /// Check every field against the platform bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_FREQ_HZ..=MAX_FREQ_HZ).contains(&self.center_frequency_hz) {
            return Err(ConfigError::FrequencyOutOfRange(self.center_frequency_hz));
        }
        if !(MIN_RATE_SPS..=MAX_RATE_SPS).contains(&self.sample_rate_hz) {
            return Err(ConfigError::SampleRateOutOfRange(self.sample_rate_hz));
        }
        if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&self.gain_db) {
            return Err(ConfigError::GainOutOfRange(self.gain_db));
        }
        if self.bandwidth_hz > self.sample_rate_hz {
            return Err(ConfigError::BandwidthExceedsRate {
                bandwidth_hz: self.bandwidth_hz,
                sample_rate_hz: self.sample_rate_hz,
            });
        }
        Ok(())
    }

    /// Return a copy with the given partial update folded in.
    pub fn with_update(&self, update: &ConfigUpdate) -> SdrConfig {
        SdrConfig {
            center_frequency_hz: update
                .center_frequency_hz
                .unwrap_or(self.center_frequency_hz),
            sample_rate_hz: update.sample_rate_hz.unwrap_or(self.sample_rate_hz),
            bandwidth_hz: update.bandwidth_hz.unwrap_or(self.bandwidth_hz),
            gain_db: update.gain_db.unwrap_or(self.gain_db),
        }
    }
}

impl Default for SdrConfig {
    fn default() -> Self {
        SdrConfig {
            center_frequency_hz: 100_000_000,
            sample_rate_hz: 2_500_000,
            bandwidth_hz: SdrConfig::default_bandwidth(2_500_000),
            gain_db: 40.0,
        }
    }
}

/// The subset of fields a Context packet proposed. Absent fields keep
/// their current value.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ConfigUpdate {
    /// Proposed center frequency.
    pub center_frequency_hz: Option<u64>,
    /// Proposed sample rate.
    pub sample_rate_hz: Option<u32>,
    /// Proposed bandwidth.
    pub bandwidth_hz: Option<u32>,
    /// Proposed gain.
    pub gain_db: Option<f64>,
}

impl ConfigUpdate {
    /// True when the update carries no fields at all.
    pub fn is_empty(&self) -> bool {
        *self == ConfigUpdate::default()
    }
}

struct ConfigState {
    config: SdrConfig,
    dirty: bool,
}

/// Mutex-guarded configuration record shared between the workers.
pub struct ConfigStore {
    inner: Mutex<ConfigState>,
}

impl ConfigStore {
    /// Create a store seeded with the given configuration, clean.
    pub fn new(config: SdrConfig) -> ConfigStore {
        ConfigStore {
            inner: Mutex::new(ConfigState {
                config,
                dirty: false,
            }),
        }
    }

    /// Current configuration, ignoring dirtiness.
    pub fn current(&self) -> SdrConfig {
        self.inner.lock().config
    }

    /// Snapshot the configuration together with the dirty flag.
    pub fn snapshot(&self) -> (SdrConfig, bool) {
        let state = self.inner.lock();
        (state.config, state.dirty)
    }

    /// Fold a validated update into the store. Raises the dirty flag and
    /// returns true only if some field actually changed.
    pub fn apply_update(&self, update: &ConfigUpdate) -> bool {
        let mut state = self.inner.lock();
        let merged = state.config.with_update(update);
        if merged == state.config {
            return false;
        }
        state.config = merged;
        state.dirty = true;
        true
    }

    /// Clear the dirty flag once the hardware reflects the store.
    pub fn clear_dirty(&self) {
        self.inner.lock().dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_enforced() {
        let good = SdrConfig::default();
        assert!(good.validate().is_ok());

        let mut cfg = good;
        cfg.center_frequency_hz = 69_999_999;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FrequencyOutOfRange(_))
        ));

        let mut cfg = good;
        cfg.sample_rate_hz = 62_000_000;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::SampleRateOutOfRange(_))
        ));

        let mut cfg = good;
        cfg.gain_db = 77.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::GainOutOfRange(_))));

        let mut cfg = good;
        cfg.bandwidth_hz = cfg.sample_rate_hz + 1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::BandwidthExceedsRate { .. })
        ));
    }

    #[test]
    fn default_bandwidth_is_80_percent() {
        assert_eq!(SdrConfig::default_bandwidth(2_500_000), 2_000_000);
        assert_eq!(SdrConfig::default_bandwidth(61_440_000), 49_152_000);
    }

    #[test]
    fn dirty_tracks_real_changes_only() {
        let store = ConfigStore::new(SdrConfig::default());
        assert_eq!(store.snapshot().1, false);

        // Same values: not a change, no dirtying.
        let noop = ConfigUpdate {
            center_frequency_hz: Some(100_000_000),
            ..ConfigUpdate::default()
        };
        assert!(!store.apply_update(&noop));
        assert!(!store.snapshot().1);

        let retune = ConfigUpdate {
            center_frequency_hz: Some(103_700_000),
            gain_db: Some(30.0),
            ..ConfigUpdate::default()
        };
        assert!(store.apply_update(&retune));
        let (cfg, dirty) = store.snapshot();
        assert!(dirty);
        assert_eq!(cfg.center_frequency_hz, 103_700_000);
        assert_eq!(cfg.gain_db, 30.0);
        assert_eq!(cfg.sample_rate_hz, 2_500_000);

        store.clear_dirty();
        assert!(!store.snapshot().1);
        assert_eq!(store.current().center_frequency_hz, 103_700_000);
    }
}
