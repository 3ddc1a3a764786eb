// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The context packet payload: a CIF word followed by the asserted fields
in strict descending CIF-bit order.

Frequencies, bandwidth, and sample rate ride as 64-bit signed fixed
point with a 20-bit radix; gain as two Q7 stages. The reader is written
by hand so it can step over asserted fields this crate knows the width
of but does not model, instead of rejecting the packet outright.
*/

use core::fmt;

use deku::no_std_io;
use deku::prelude::*;
use deku::reader::Reader;
use deku::writer::Writer;
use fixed::{types::extra::U20, FixedI64};

use crate::cif0::Cif0;
use crate::gain::Gain;
use crate::state_events::StateEvents;

/// Context packet payload. Includes the CIF and optional fields.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Context {
    /// CIF0 indicator fields.
    cif0: Cif0,
    /// Bandwidth in fixed-point Hz.
    bandwidth: Option<i64>,
    /// RF reference frequency in fixed-point Hz.
    rf_ref_freq: Option<i64>,
    /// Two-stage gain word.
    gain: Option<Gain>,
    /// Sample rate in fixed-point samples per second.
    sample_rate: Option<i64>,
    /// State and event indicators.
    state_and_event: Option<StateEvents>,
}

fn to_fixed(v: f64) -> i64 {
    FixedI64::<U20>::from_num(v).to_bits()
}

fn from_fixed(bits: i64) -> f64 {
    FixedI64::<U20>::from_bits(bits).to_num()
}

impl Context {
    /// Create a new context payload with no CIF bits or fields set.
    pub fn new() -> Context {
        Context::default()
    }

    /// Gets a reference to the CIF0 word.
    pub fn cif0(&self) -> &Cif0 {
        &self.cif0
    }

    /// Returns true if the context field change indicator is set, false if not.
    pub fn context_changed(&self) -> bool {
        self.cif0.context_field_changed()
    }

    /// Set the context field change indicator bit.
    pub fn set_context_changed(&mut self, changed: bool) {
        if changed {
            self.cif0.set_context_field_changed()
        } else {
            self.cif0.unset_context_field_changed()
        }
    }

    /// Get the current bandwidth (Hz). If `None` is returned, the field is unset.
    pub fn bandwidth_hz(&self) -> Option<f64> {
        self.bandwidth.map(from_fixed)
    }

    /// Set the bandwidth (Hz). If `None` is passed, the field will be unset.
    ///
    /// [`update_packet_size()`](crate::Vrt::update_packet_size()) should be
    /// executed after running this method.
    pub fn set_bandwidth_hz(&mut self, bandwidth_hz: Option<f64>) {
        if let Some(v) = bandwidth_hz {
            self.bandwidth = Some(to_fixed(v));
            self.cif0.set_bandwidth();
        } else {
            self.bandwidth = None;
            self.cif0.unset_bandwidth();
        }
    }

    /// Get the current RF reference frequency (Hz). If `None` is returned,
    /// the field is unset.
    pub fn rf_ref_freq_hz(&self) -> Option<f64> {
        self.rf_ref_freq.map(from_fixed)
    }

    /// Set the RF reference frequency (Hz). If `None` is passed, the field
    /// will be unset.
    ///
    /// [`update_packet_size()`](crate::Vrt::update_packet_size()) should be
    /// executed after running this method.
    pub fn set_rf_ref_freq_hz(&mut self, rf_ref_freq_hz: Option<f64>) {
        if let Some(v) = rf_ref_freq_hz {
            self.rf_ref_freq = Some(to_fixed(v));
            self.cif0.set_rf_ref_freq();
        } else {
            self.rf_ref_freq = None;
            self.cif0.unset_rf_ref_freq();
        }
    }

    /// Get the current gain word. If `None` is returned, the field is unset.
    pub fn gain(&self) -> Option<Gain> {
        self.gain
    }

    /// Set the gain word. If `None` is passed, the field will be unset.
    ///
    /// [`update_packet_size()`](crate::Vrt::update_packet_size()) should be
    /// executed after running this method.
    pub fn set_gain(&mut self, gain: Option<Gain>) {
        self.gain = gain;
        if gain.is_some() {
            self.cif0.set_gain();
        } else {
            self.cif0.unset_gain();
        }
    }

    /// Get the stage 1 gain in dB, if the gain field is set.
    pub fn gain_db(&self) -> Option<f64> {
        self.gain.map(|g| g.stage_1_gain_db() as f64)
    }

    /// Set a single-stage gain in dB (stage 2 zero). If `None` is passed,
    /// the field will be unset.
    pub fn set_gain_db(&mut self, gain_db: Option<f64>) {
        self.set_gain(gain_db.map(|db| Gain::new(db as f32, 0.0)));
    }

    /// Get the current sample rate (samples per second). If `None` is
    /// returned, the field is unset.
    pub fn sample_rate_sps(&self) -> Option<f64> {
        self.sample_rate.map(from_fixed)
    }

    /// Set the sample rate (samples per second). If `None` is passed, the
    /// field will be unset.
    ///
    /// [`update_packet_size()`](crate::Vrt::update_packet_size()) should be
    /// executed after running this method.
    pub fn set_sample_rate_sps(&mut self, sample_rate_sps: Option<f64>) {
        if let Some(v) = sample_rate_sps {
            self.sample_rate = Some(to_fixed(v));
            self.cif0.set_sample_rate();
        } else {
            self.sample_rate = None;
            self.cif0.unset_sample_rate();
        }
    }

    /// Get the state and event indicators. If `None` is returned, the field
    /// is unset.
    pub fn state_and_event(&self) -> Option<StateEvents> {
        self.state_and_event
    }

    /// Set the state and event indicators. If `None` is passed, the field
    /// will be unset.
    ///
    /// [`update_packet_size()`](crate::Vrt::update_packet_size()) should be
    /// executed after running this method.
    pub fn set_state_and_event(&mut self, indicators: Option<StateEvents>) {
        self.state_and_event = indicators;
        if self.state_and_event.is_some() {
            self.cif0.set_state_and_event_indicators();
        } else {
            self.cif0.unset_state_and_event_indicators();
        }
    }

    /// Returns the size of the context payload in 32-bit words.
    pub fn size_words(&self) -> u16 {
        // One word for the CIF itself.
        let mut ret = 1;
        if self.bandwidth.is_some() {
            ret += 2;
        }
        if self.rf_ref_freq.is_some() {
            ret += 2;
        }
        if let Some(g) = &self.gain {
            ret += g.size_words();
        }
        if self.sample_rate.is_some() {
            ret += 2;
        }
        if self.state_and_event.is_some() {
            ret += 1;
        }
        ret
    }
}

impl<'a> DekuReader<'a, deku::ctx::Endian> for Context {
    fn from_reader_with_ctx<R: no_std_io::Read + no_std_io::Seek>(
        reader: &mut Reader<R>,
        endian: deku::ctx::Endian,
    ) -> Result<Self, DekuError> {
        let cif0 = Cif0::from_reader_with_ctx(reader, endian)?;
        let mut context = Context {
            cif0,
            ..Context::default()
        };
        // Fields follow in descending CIF-bit order. Asserted bits with a
        // known width that this crate does not model are stepped over;
        // anything else is unparseable.
        for bit in (0u8..=31).rev() {
            if !cif0.bit(bit) {
                continue;
            }
            match bit {
                // Change indicator carries no field.
                31 => (),
                29 => context.bandwidth = Some(i64::from_reader_with_ctx(reader, endian)?),
                27 => context.rf_ref_freq = Some(i64::from_reader_with_ctx(reader, endian)?),
                23 => context.gain = Some(Gain::from_reader_with_ctx(reader, endian)?),
                21 => context.sample_rate = Some(i64::from_reader_with_ctx(reader, endian)?),
                19 => {
                    context.state_and_event =
                        Some(StateEvents::from_reader_with_ctx(reader, endian)?)
                }
                b => match Cif0::skip_size_words(b) {
                    Some(words) => {
                        log::debug!("skipping unmodeled CIF0 field at bit {b} ({words} words)");
                        for _ in 0..words {
                            let _ = u32::from_reader_with_ctx(reader, endian)?;
                        }
                    }
                    None => {
                        return Err(DekuError::Parse(
                            format!("CIF0 bit {b} asserts a field of unknown size").into(),
                        ))
                    }
                },
            }
        }
        Ok(context)
    }
}

impl DekuWriter<deku::ctx::Endian> for Context {
    fn to_writer<W: no_std_io::Write + no_std_io::Seek>(
        &self,
        writer: &mut Writer<W>,
        endian: deku::ctx::Endian,
    ) -> Result<(), DekuError> {
        self.cif0.to_writer(writer, endian)?;
        if let Some(v) = self.bandwidth {
            v.to_writer(writer, endian)?;
        }
        if let Some(v) = self.rf_ref_freq {
            v.to_writer(writer, endian)?;
        }
        if let Some(g) = &self.gain {
            g.to_writer(writer, endian)?;
        }
        if let Some(v) = self.sample_rate {
            v.to_writer(writer, endian)?;
        }
        if let Some(se) = &self.state_and_event {
            se.to_writer(writer, endian)?;
        }
        Ok(())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(bw) = &self.bandwidth_hz() {
            writeln!(f, "Bandwidth: {} Hz", bw)?;
        }
        if let Some(rf_freq) = &self.rf_ref_freq_hz() {
            writeln!(f, "RF reference frequency: {} Hz", rf_freq)?;
        }
        if let Some(gain) = &self.gain() {
            writeln!(f, "Gain: {}", gain)?;
        }
        if let Some(samp_rate) = &self.sample_rate_sps() {
            writeln!(f, "Sample rate: {} sps", samp_rate)?;
        }
        if let Some(se) = &self.state_and_event() {
            writeln!(f, "State/event indicators: {:#010x}", se.as_u32())?;
        }
        Ok(())
    }
}
