// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Data structures and methods related to the trailer field
(ANSI/VITA-49.0 section 6.1.7).

Each indicator has an enable bit in [31:20] paired with a state bit
twelve positions down in [19:8]; an indicator is only meaningful when
its enable bit is set.
*/

use deku::prelude::*;

/// Base trailer field data structure.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, DekuRead, DekuWrite,
)]
#[deku(endian = "endian", ctx = "endian: deku::ctx::Endian")]
pub struct Trailer(u32);

impl Trailer {
    /// Create a trailer with the valid-data indicator enabled and set,
    /// the normal-operation marking on every emitted data packet.
    pub fn new_valid_data() -> Trailer {
        Trailer((1 << 30) | (1 << 18))
    }

    fn cal_time_enabled(&self) -> bool {
        self.0 & (1 << 31) > 0
    }
    fn valid_data_enabled(&self) -> bool {
        self.0 & (1 << 30) > 0
    }
    fn over_range_enabled(&self) -> bool {
        self.0 & (1 << 25) > 0
    }
    fn sample_loss_enabled(&self) -> bool {
        self.0 & (1 << 24) > 0
    }

    /// Returns the calibration time indicator status if present.
    pub fn cal_time_indicator(&self) -> Option<bool> {
        if self.cal_time_enabled() {
            Some(self.0 & (1 << 19) > 0)
        } else {
            None
        }
    }
    /// Returns the valid data indicator status if present.
    pub fn valid_data_indicator(&self) -> Option<bool> {
        if self.valid_data_enabled() {
            Some(self.0 & (1 << 18) > 0)
        } else {
            None
        }
    }
    /// Returns the over range indicator status if present.
    pub fn over_range_indicator(&self) -> Option<bool> {
        if self.over_range_enabled() {
            Some(self.0 & (1 << 13) > 0)
        } else {
            None
        }
    }
    /// Returns the sample loss indicator status if present.
    pub fn sample_loss_indicator(&self) -> Option<bool> {
        if self.sample_loss_enabled() {
            Some(self.0 & (1 << 12) > 0)
        } else {
            None
        }
    }

    /// Returns the raw trailer word.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_data_trailer() {
        let trailer = Trailer::new_valid_data();
        assert_eq!(trailer.valid_data_indicator(), Some(true));
        assert_eq!(trailer.cal_time_indicator(), None);
        assert_eq!(trailer.over_range_indicator(), None);
        assert_eq!(trailer.as_u32(), (1 << 30) | (1 << 18));
    }
}
