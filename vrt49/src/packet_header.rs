// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Data structures and methods related to the packet header format
(ANSI/VITA-49.0 section 6.1.1).
*/

use deku::prelude::*;

/// Base packet header data structure.
///
/// The prologue word is stored as two 16-bit halves: the packed
/// type/flag/count half-word and the packet size in 32-bit words.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, DekuRead, DekuWrite,
)]
#[deku(endian = "endian", ctx = "endian: deku::ctx::Endian")]
pub struct PacketHeader {
    hword_1: u16,
    packet_size: u16,
}

/// The type of VRT packet being worked on.
///
/// Note: the packet type is used throughout this crate to determine
/// how to serialize and deserialize the payload, so it's important
/// that this field is correctly set.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum PacketType {
    /// Signal data packet without a stream ID.
    SignalDataWithoutStreamId,
    /// Signal data packet *with* a stream ID.
    SignalData,
    /// Extension data packet without a stream ID.
    ExtensionDataWithoutStreamId,
    /// Extension data packet *with* a stream ID.
    ExtensionData,
    /// Context packet.
    Context,
    /// Extension context packet.
    ExtensionContext,
    /// A type nibble VITA 49.0 reserves (0x6..=0xF). Packets carrying
    /// one cannot be decoded.
    Reserved(u8),
}

impl PacketType {
    /// Returns true if the packet type carries a signal data payload.
    pub fn is_data(&self) -> bool {
        matches!(
            &self,
            PacketType::SignalData
                | PacketType::SignalDataWithoutStreamId
                | PacketType::ExtensionData
                | PacketType::ExtensionDataWithoutStreamId
        )
    }
    /// Returns true if the packet type carries a context payload.
    pub fn is_context(&self) -> bool {
        matches!(&self, PacketType::Context | PacketType::ExtensionContext)
    }

    pub(crate) fn nibble(&self) -> u8 {
        match self {
            PacketType::SignalDataWithoutStreamId => 0x0,
            PacketType::SignalData => 0x1,
            PacketType::ExtensionDataWithoutStreamId => 0x2,
            PacketType::ExtensionData => 0x3,
            PacketType::Context => 0x4,
            PacketType::ExtensionContext => 0x5,
            PacketType::Reserved(n) => n & 0xF,
        }
    }
}

impl From<u8> for PacketType {
    fn from(value: u8) -> Self {
        match value & 0xF {
            0x0 => PacketType::SignalDataWithoutStreamId,
            0x1 => PacketType::SignalData,
            0x2 => PacketType::ExtensionDataWithoutStreamId,
            0x3 => PacketType::ExtensionData,
            0x4 => PacketType::Context,
            0x5 => PacketType::ExtensionContext,
            n => PacketType::Reserved(n),
        }
    }
}

/// Context timestamp mode (TSM).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum TimestampMode {
    /// Timestamps convey the precise timing of events or context changes.
    PreciseTiming,
    /// Timestamps convey general timing at data sampling-interval
    /// resolution.
    GeneralTiming,
}

impl From<bool> for TimestampMode {
    fn from(value: bool) -> Self {
        if value {
            TimestampMode::GeneralTiming
        } else {
            TimestampMode::PreciseTiming
        }
    }
}

/// Indicator bits [26:24] of the prologue word. Their meaning depends on
/// whether the packet is a signal data or context packet.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Indicators {
    /// The bits represent signal data indicators.
    SignalData(SignalDataIndicators),
    /// The bits represent context indicators.
    Context(ContextIndicators),
}

/// Signal data indicator fields.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct SignalDataIndicators {
    /// The packet includes a trailer.
    pub trailer_included: bool,
    /// The packet is not compliant with VITA 49.0.
    pub not_a_vita490_packet: bool,
    /// The signal data represents spectral data.
    pub signal_spectral_data: bool,
}

/// Context packet indicator fields.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ContextIndicators {
    /// The packet is not compliant with VITA 49.0.
    pub not_a_vita490_packet: bool,
    /// Context timestamp mode.
    pub timestamp_mode: TimestampMode,
}

/// TimeStamp-Integer (TSI) field.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Tsi {
    /// Timestamp is not included.
    Null,
    /// Timestamp represents UTC time.
    Utc,
    /// Timestamp represents GPS time.
    Gps,
    /// Timestamp represents some other time.
    Other,
}

impl From<u8> for Tsi {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0x0 => Tsi::Null,
            0x1 => Tsi::Utc,
            0x2 => Tsi::Gps,
            _ => Tsi::Other,
        }
    }
}

/// TimeStamp-Fractional (TSF) field.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Tsf {
    /// Timestamp is not included.
    Null,
    /// Timestamp represents a sample counter.
    SampleCount,
    /// Timestamp represents a real fractional time (in picoseconds).
    RealTimePs,
    /// Timestamp represents a free-running count.
    FreeRunningCount,
}

impl From<u8> for Tsf {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0x0 => Tsf::Null,
            0x1 => Tsf::SampleCount,
            0x2 => Tsf::RealTimePs,
            _ => Tsf::FreeRunningCount,
        }
    }
}

impl PacketHeader {
    const fn tsi_bits(&self) -> u8 {
        ((self.hword_1 >> 6) & 0b11) as u8
    }
    const fn tsf_bits(&self) -> u8 {
        ((self.hword_1 >> 4) & 0b11) as u8
    }

    /// Gets the raw 32-bit value of the packet header.
    pub fn as_u32(&self) -> u32 {
        ((self.hword_1 as u32) << 16) | ((self.packet_size as u32) & 0xFFFF)
    }
    /// Gets the packet type.
    pub fn packet_type(&self) -> PacketType {
        (((self.hword_1 >> 12) & 0b1111) as u8).into()
    }
    /// Sets the packet type.
    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        self.hword_1 &= !(0b1111 << 12);
        self.hword_1 |= (packet_type.nibble() as u16) << 12
    }
    /// Returns true if a class identifier is included in the packet.
    pub fn class_id_included(&self) -> bool {
        self.hword_1 & (1 << 11) > 0
    }

    /// Sets the class_id_included flag.
    pub(crate) fn set_class_id_included(&mut self, included: bool) {
        self.hword_1 = (self.hword_1 & !(1 << 11)) | ((included as u16) << 11);
    }

    /// Returns the packet indicators, or `None` for a reserved packet
    /// type. The indicators differ depending on the type of packet
    /// you're working with, so you'll need to disambiguate.
    pub fn indicators(&self) -> Option<Indicators> {
        let i1 = self.hword_1 & (1 << 10) > 0;
        let i2 = self.hword_1 & (1 << 9) > 0;
        let i3 = self.hword_1 & (1 << 8) > 0;
        let ty = self.packet_type();
        if ty.is_data() {
            Some(Indicators::SignalData(SignalDataIndicators {
                trailer_included: i1,
                not_a_vita490_packet: i2,
                signal_spectral_data: i3,
            }))
        } else if ty.is_context() {
            Some(Indicators::Context(ContextIndicators {
                // i1 is reserved
                not_a_vita490_packet: i2,
                timestamp_mode: i3.into(),
            }))
        } else {
            None
        }
    }
    /// Sets the header indicators.
    pub fn set_indicators(&mut self, indicators: Indicators) {
        self.hword_1 &= !(0b111 << 8);
        match indicators {
            Indicators::SignalData(i) => {
                self.hword_1 |= (i.trailer_included as u16) << 10;
                self.hword_1 |= (i.not_a_vita490_packet as u16) << 9;
                self.hword_1 |= (i.signal_spectral_data as u16) << 8;
            }
            Indicators::Context(i) => {
                self.hword_1 |= (i.not_a_vita490_packet as u16) << 9;
                self.hword_1 |= ((i.timestamp_mode == TimestampMode::GeneralTiming) as u16) << 8;
            }
        }
    }

    /// Gets the TimeStamp-Integer (TSI) field.
    pub fn tsi(&self) -> Tsi {
        self.tsi_bits().into()
    }

    /// Sets the TimeStamp-Integer (TSI) field.
    pub(crate) fn set_tsi(&mut self, tsi: Tsi) {
        let bits = match tsi {
            Tsi::Null => 0u16,
            Tsi::Utc => 1,
            Tsi::Gps => 2,
            Tsi::Other => 3,
        };
        self.hword_1 = (self.hword_1 & !(0b11 << 6)) | (bits << 6);
    }

    /// Gets the TimeStamp-Fractional (TSF) field.
    pub fn tsf(&self) -> Tsf {
        self.tsf_bits().into()
    }

    /// Sets the TimeStamp-Fractional (TSF) field.
    pub(crate) fn set_tsf(&mut self, tsf: Tsf) {
        let bits = match tsf {
            Tsf::Null => 0u16,
            Tsf::SampleCount => 1,
            Tsf::RealTimePs => 2,
            Tsf::FreeRunningCount => 3,
        };
        self.hword_1 = (self.hword_1 & !(0b11 << 4)) | (bits << 4);
    }

    /// Gets the modulo-16 packet counter field.
    pub fn packet_count(&self) -> u8 {
        (self.hword_1 & 0b1111) as u8
    }
    /// Sets the modulo-16 packet counter field.
    pub fn set_packet_count(&mut self, count: u8) {
        let masked_count = (count & 0b1111) as u16;
        self.hword_1 = (self.hword_1 & (!0b1111)) | masked_count;
    }
    /// Increments the packet counter by one (wrapping at 16).
    pub fn inc_packet_count(&mut self) {
        self.set_packet_count((self.packet_count() + 1) % 16);
    }

    /// Gets the packet size field (32-bit words).
    pub fn packet_size(&self) -> u16 {
        self.packet_size
    }
    /// Sets the packet size field (32-bit words).
    pub fn set_packet_size(&mut self, n_words: u16) {
        self.packet_size = n_words;
    }

    /// Returns true if a stream ID is included, false if not.
    pub fn stream_id_included(&self) -> bool {
        !matches!(
            &self.packet_type(),
            PacketType::SignalDataWithoutStreamId | PacketType::ExtensionDataWithoutStreamId
        )
    }

    /// Returns true if an integer timestamp is included, false if not.
    pub fn integer_timestamp_included(&self) -> bool {
        self.tsi() != Tsi::Null
    }

    /// Returns true if a fractional timestamp is included, false if not.
    pub fn fractional_timestamp_included(&self) -> bool {
        self.tsf() != Tsf::Null
    }

    /// Returns true if a trailer is included, false if not.
    pub fn trailer_included(&self) -> bool {
        match &self.indicators() {
            Some(Indicators::SignalData(i)) => i.trailer_included,
            _ => false,
        }
    }

    /// Sets the trailer-included indicator (signal data packets only).
    pub(crate) fn set_trailer_included(&mut self, included: bool) {
        if self.packet_type().is_data() {
            self.hword_1 = (self.hword_1 & !(1 << 10)) | ((included as u16) << 10);
        }
    }

    /// Returns the number of prologue words (header through timestamps)
    /// for this header's flag combination.
    pub fn prologue_size_words(&self) -> usize {
        let mut ret = 1;
        if self.stream_id_included() {
            ret += 1;
        }
        if self.class_id_included() {
            ret += 2;
        }
        if self.integer_timestamp_included() {
            ret += 1;
        }
        if self.fractional_timestamp_included() {
            ret += 2;
        }
        ret
    }

    /// Returns the payload size in 32-bit words.
    ///
    /// A header whose declared packet size is smaller than its own
    /// prologue yields zero; the container's length validation rejects
    /// such packets.
    pub fn payload_size_words(&self) -> usize {
        let mut overhead = self.prologue_size_words();
        if self.trailer_included() {
            overhead += 1;
        }
        (self.packet_size as usize).saturating_sub(overhead)
    }

    /// Creates a new signal data packet header with some sane defaults.
    pub fn new_signal_data_header() -> PacketHeader {
        let mut ret = PacketHeader {
            hword_1: 0,
            packet_size: 0,
        };
        ret.set_packet_type(PacketType::SignalData);
        ret.set_indicators(Indicators::SignalData(SignalDataIndicators {
            trailer_included: false,
            not_a_vita490_packet: false,
            signal_spectral_data: false,
        }));
        ret
    }

    /// Creates a new context packet header with some sane defaults.
    pub fn new_context_header() -> PacketHeader {
        let mut ret = PacketHeader {
            hword_1: 0,
            packet_size: 0,
        };
        ret.set_packet_type(PacketType::Context);
        ret.set_indicators(Indicators::Context(ContextIndicators {
            not_a_vita490_packet: false,
            timestamp_mode: TimestampMode::GeneralTiming,
        }));
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_header_layout() {
        use crate::prelude::*;
        let packet = Vrt::new_context_packet();
        assert!(matches!(
            packet.header().packet_type(),
            PacketType::Context
        ));
        assert_eq!(packet.header().as_u32() >> 28, 0b0100);
    }

    #[test]
    fn packet_count_wraps() {
        let mut header = PacketHeader::new_signal_data_header();
        for expected in (0..16).chain(0..16) {
            assert_eq!(header.packet_count(), expected);
            header.inc_packet_count();
        }
    }

    #[test]
    fn timestamp_flags() {
        let mut header = PacketHeader::new_signal_data_header();
        assert!(!header.integer_timestamp_included());
        header.set_tsi(Tsi::Utc);
        header.set_tsf(Tsf::RealTimePs);
        assert!(header.integer_timestamp_included());
        assert!(header.fractional_timestamp_included());
        // TSI lands in header bits [23:22], TSF in [21:20].
        assert_eq!((header.as_u32() >> 22) & 0b11, 0b01);
        assert_eq!((header.as_u32() >> 20) & 0b11, 0b10);
    }

    #[test]
    fn trailer_flag_only_on_data_packets() {
        let mut header = PacketHeader::new_context_header();
        header.set_trailer_included(true);
        assert!(!header.trailer_included());

        let mut header = PacketHeader::new_signal_data_header();
        header.set_trailer_included(true);
        assert!(header.trailer_included());
        assert_eq!((header.as_u32() >> 26) & 1, 1);
    }

    #[test]
    fn reserved_type_has_no_indicators() {
        let mut header = PacketHeader::default();
        header.set_packet_type(PacketType::Reserved(0x9));
        assert!(header.indicators().is_none());
    }
}
