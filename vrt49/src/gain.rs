// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Data structures and methods related to the gain format.

Stage 1 gain conveys the front-end or RF gain, and stage 2 gain conveys
the back-end or IF gain. For equipment that does not require gain
distribution, stage 1 carries the gain of the device and stage 2 is set
to zero. Both stages are 16-bit signed fixed point with a 7-bit radix;
stage 1 occupies the most significant half-word, so it appears first on
the wire.
*/

use deku::prelude::*;
use fixed::{types::extra::U7, FixedI16};
use std::fmt;

/// Base gain data structure.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, DekuRead, DekuWrite,
)]
#[deku(endian = "endian", ctx = "endian: deku::ctx::Endian")]
pub struct Gain(u32);

impl Gain {
    /// Create a new `Gain` object given stage 1 and 2 gain in dB.
    pub fn new(stage_1_gain_db: f32, stage_2_gain_db: f32) -> Gain {
        let s1 = FixedI16::<U7>::from_num(stage_1_gain_db).to_bits() as u16;
        let s2 = FixedI16::<U7>::from_num(stage_2_gain_db).to_bits() as u16;
        Gain(((s1 as u32) << 16) | s2 as u32)
    }

    /// Gets the size of the gain structure in 32-bit words.
    pub fn size_words(&self) -> u16 {
        1
    }

    /// Gets stage 1 gain (dB)
    pub fn stage_1_gain_db(&self) -> f32 {
        let s1 = ((self.0 >> 16) & 0xFFFF) as i16;
        FixedI16::<U7>::from_bits(s1).to_num()
    }

    /// Sets stage 1 gain (dB)
    pub fn set_stage_1_gain_db(&mut self, stage_1_gain_db: f32) {
        let s1 = FixedI16::<U7>::from_num(stage_1_gain_db).to_bits() as u16;
        self.0 = (self.0 & 0x0000_FFFF) | ((s1 as u32) << 16);
    }

    /// Gets stage 2 gain (dB)
    pub fn stage_2_gain_db(&self) -> f32 {
        let s2 = (self.0 & 0xFFFF) as i16;
        FixedI16::<U7>::from_bits(s2).to_num()
    }

    /// Sets stage 2 gain (dB)
    pub fn set_stage_2_gain_db(&mut self, stage_2_gain_db: f32) {
        let s2 = FixedI16::<U7>::from_num(stage_2_gain_db).to_bits() as u16;
        self.0 = (self.0 & 0xFFFF_0000) | s2 as u32;
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "Stage 1: {} dB, Stage 2: {} dB",
            self.stage_1_gain_db(),
            self.stage_2_gain_db()
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn manipulate_gain() {
        let s1: f32 = 25.2;
        let s2: f32 = 0.23;
        let gain = Gain::new(s1, s2);
        assert_relative_eq!(gain.stage_1_gain_db(), s1, max_relative = 0.1);
        assert_relative_eq!(gain.stage_2_gain_db(), s2, max_relative = 0.1);

        let mut gain = Gain::default();
        gain.set_stage_1_gain_db(-3.5);
        gain.set_stage_2_gain_db(12.25);
        assert_relative_eq!(gain.stage_1_gain_db(), -3.5);
        assert_relative_eq!(gain.stage_2_gain_db(), 12.25);
    }

    #[test]
    fn stage_1_leads_on_the_wire() {
        // 40 dB in Q7 is 40 * 128 = 5120 = 0x1400, carried in the high
        // half-word ahead of the zero stage 2.
        let gain = Gain::new(40.0, 0.0);
        assert_eq!(gain.0, 0x1400_0000);
    }
}
