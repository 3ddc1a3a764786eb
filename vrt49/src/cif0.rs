// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Defines the Context Indicator Field (CIF) of a VITA 49.0 context packet:
one 32-bit bitmask naming which optional fields follow it, in descending
bit order.
*/

use deku::prelude::*;

macro_rules! cif_field {
    ($field:ident, $set:ident, $unset:ident, $bit:literal) => {
        /// Returns true if the corresponding CIF field bit is set.
        pub fn $field(&self) -> bool {
            self.0 & (1 << $bit) != 0
        }
        /// Sets the corresponding CIF field bit.
        pub fn $set(&mut self) {
            self.0 |= 1 << $bit;
        }
        /// Unsets the corresponding CIF field bit.
        pub fn $unset(&mut self) {
            self.0 &= !(1 << $bit);
        }
    };
}

/// Base data structure for the CIF single-bit indicators.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, DekuRead, DekuWrite,
)]
#[deku(endian = "endian", ctx = "endian: deku::ctx::Endian")]
pub struct Cif0(u32);

impl Cif0 {
    cif_field!(
        context_field_changed,
        set_context_field_changed,
        unset_context_field_changed,
        31
    );
    cif_field!(bandwidth, set_bandwidth, unset_bandwidth, 29);
    cif_field!(rf_ref_freq, set_rf_ref_freq, unset_rf_ref_freq, 27);
    cif_field!(gain, set_gain, unset_gain, 23);
    cif_field!(sample_rate, set_sample_rate, unset_sample_rate, 21);
    cif_field!(
        state_and_event_indicators,
        set_state_and_event_indicators,
        unset_state_and_event_indicators,
        19
    );

    /// Returns true if the given bit index is asserted.
    pub fn bit(&self, index: u8) -> bool {
        self.0 & (1u32 << index) != 0
    }

    /// Returns the raw CIF word.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Word size of fields this crate parses but does not model, so the
    /// decoder can step over them. `None` means the field width is
    /// unknown and the packet cannot be decoded safely.
    pub(crate) fn skip_size_words(bit: u8) -> Option<usize> {
        match bit {
            30 => Some(1), // reference point ID
            28 => Some(2), // IF reference frequency
            26 => Some(2), // RF reference frequency offset
            25 => Some(2), // IF band offset
            24 => Some(1), // reference level
            22 => Some(1), // over-range count
            20 => Some(2), // timestamp adjustment
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manipulate_bits() {
        let mut cif = Cif0::default();
        assert!(!cif.bandwidth());
        cif.set_bandwidth();
        cif.set_sample_rate();
        assert!(cif.bandwidth());
        assert!(cif.sample_rate());
        assert_eq!(cif.as_u32(), (1 << 29) | (1 << 21));
        cif.unset_bandwidth();
        assert_eq!(cif.as_u32(), 1 << 21);
    }
}
