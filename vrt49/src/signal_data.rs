// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The signal data packet payload: raw 32-bit words. For an I/Q stream,
each word carries one interleaved sample pair — a signed 16-bit I
followed by a signed 16-bit Q, both big-endian on the wire.
*/

use deku::prelude::*;

use crate::packet_header::PacketHeader;
use crate::VrtError;

/// Signal data payload. Internally, the payload is kept as a vector of
/// 32-bit words so the serialized form is always word aligned.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, DekuRead, DekuWrite)]
#[deku(endian = "endian", ctx = "endian: deku::ctx::Endian, packet_header: &PacketHeader")]
pub struct SignalData {
    #[deku(count = "packet_header.payload_size_words()")]
    words: Vec<u32>,
}

impl SignalData {
    /// Create a new, empty signal data payload.
    pub fn new() -> SignalData {
        SignalData::default()
    }

    /// Gets the payload size in 32-bit words.
    pub fn size_words(&self) -> u16 {
        self.words.len() as u16
    }

    /// Gets the payload size in bytes.
    pub fn payload_size_bytes(&self) -> usize {
        self.words.len() * 4
    }

    /// Get the payload as a vector of bytes (wire order).
    pub fn payload(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(self.payload_size_bytes());
        for word in &self.words {
            ret.extend_from_slice(&word.to_be_bytes());
        }
        ret
    }

    /// Set the payload to some raw bytes.
    ///
    /// # Errors
    /// The payload must be a whole number of 32-bit words; a byte slice
    /// with a length indivisible by 4 returns an error.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<(), VrtError> {
        if payload.len() % 4 != 0 {
            return Err(VrtError::PayloadUnaligned);
        }
        self.words.clear();
        for chunk in payload.chunks_exact(4) {
            self.words
                .push(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(())
    }

    /// Get the payload as interleaved 16-bit I/Q samples.
    pub fn iq_samples(&self) -> Vec<i16> {
        let mut ret = Vec::with_capacity(self.words.len() * 2);
        for word in &self.words {
            ret.push((word >> 16) as i16);
            ret.push((word & 0xFFFF) as i16);
        }
        ret
    }

    /// Set the payload from interleaved 16-bit I/Q samples. Retains the
    /// payload's allocation, so a reused packet does not allocate once
    /// its capacity has been reached.
    ///
    /// # Errors
    /// Samples must arrive in whole (I, Q) pairs; an odd-length slice
    /// returns an error.
    pub fn set_iq_samples(&mut self, samples: &[i16]) -> Result<(), VrtError> {
        if samples.len() % 2 != 0 {
            return Err(VrtError::PayloadUnaligned);
        }
        self.words.clear();
        for pair in samples.chunks_exact(2) {
            self.words
                .push(((pair[0] as u16 as u32) << 16) | (pair[1] as u16 as u32));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_roundtrip() {
        let mut sig = SignalData::new();
        sig.set_payload(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(sig.payload(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(sig.payload_size_bytes(), 8);
        assert!(sig.set_payload(&[1, 2, 3]).is_err());
    }

    #[test]
    fn iq_roundtrip() {
        let samples: Vec<i16> = vec![100, -100, i16::MAX, i16::MIN, 0, -1];
        let mut sig = SignalData::new();
        sig.set_iq_samples(&samples).unwrap();
        assert_eq!(sig.iq_samples(), samples);
        // I leads Q in wire order.
        assert_eq!(sig.payload()[..4], [0, 100, 255, 156]);
        assert!(sig.set_iq_samples(&[1]).is_err());
    }
}
