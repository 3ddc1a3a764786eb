// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Primary module for parsing/generating VRT packets. This should
be the main entrypoint for any users of this crate.
*/

use deku::prelude::*;
use deku::writer::Writer;

use crate::class_id::ClassIdentifier;
use crate::packet_header::{PacketHeader, PacketType, Tsf, Tsi};
use crate::payload::Payload;
use crate::signal_data::SignalData;
use crate::Context;
use crate::Trailer;
use crate::VrtError;

/// The main VRT data structure that encapsulates all types
/// of VRT packets.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct Vrt {
    /// VRT packet header (present on all packets).
    header: PacketHeader,
    /// Stream identifier.
    #[deku(cond = "header.stream_id_included()")]
    stream_id: Option<u32>,
    /// Class identifier.
    #[deku(cond = "header.class_id_included()")]
    class_id: Option<ClassIdentifier>,
    /// Integer timestamp.
    #[deku(cond = "header.integer_timestamp_included()")]
    integer_timestamp: Option<u32>,
    /// Fractional timestamp.
    #[deku(cond = "header.fractional_timestamp_included()")]
    fractional_timestamp: Option<u64>,
    /// Packet payload. For signal data, this would be raw samples. For
    /// context, this would be radio state.
    #[deku(ctx = "header")]
    payload: Payload,
    /// Data trailer.
    #[deku(cond = "header.trailer_included()")]
    trailer: Option<Trailer>,
}

impl Vrt {
    /// Produce a new signal data packet with some sane defaults.
    ///
    /// # Example
    /// ```
    /// use vrt49::prelude::*;
    /// # fn main() -> Result<(), VrtError> {
    /// let mut packet = Vrt::new_signal_data_packet();
    /// packet.set_stream_id(Some(0xDEADBEEF));
    /// packet.set_signal_payload(&[1, 2, 3, 4, 5, 6, 7, 8])?;
    /// assert_eq!(packet.stream_id(), Some(0xDEADBEEF));
    /// assert_eq!(packet.signal_payload()?, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new_signal_data_packet() -> Vrt {
        let mut ret = Vrt {
            header: PacketHeader::new_signal_data_header(),
            stream_id: Some(0),
            class_id: None,
            integer_timestamp: None,
            fractional_timestamp: None,
            payload: Payload::SignalData(SignalData::new()),
            trailer: None,
        };
        ret.update_packet_size();
        ret
    }

    /// Produce a new context packet with some sane defaults.
    ///
    /// # Example
    /// ```
    /// use vrt49::prelude::*;
    /// let mut packet = Vrt::new_context_packet();
    /// let context: &mut Context = packet.payload_mut().context_mut().unwrap();
    /// context.set_bandwidth_hz(Some(8e6));
    /// assert_eq!(context.bandwidth_hz(), Some(8e6));
    /// ```
    pub fn new_context_packet() -> Vrt {
        let mut ret = Vrt {
            header: PacketHeader::new_context_header(),
            stream_id: Some(0),
            class_id: None,
            integer_timestamp: None,
            fractional_timestamp: None,
            payload: Payload::Context(Context::new()),
            trailer: None,
        };
        ret.update_packet_size();
        ret
    }

    /// Parse a packet out of a datagram, validating that the length the
    /// header declares matches the buffer.
    ///
    /// # Errors
    /// Returns [`VrtError::Malformed`] when the buffer cannot be decoded
    /// (truncated input, reserved packet type, CIF field running off the
    /// end) and [`VrtError::LengthMismatch`] when decoding succeeds but
    /// the declared word count disagrees with the bytes received.
    pub fn parse(input: &[u8]) -> Result<Vrt, VrtError> {
        let ((rest, _), packet) = Vrt::from_bytes((input, 0))?;
        let declared = packet.header.packet_size() as usize * 4;
        if declared != input.len() || !rest.is_empty() {
            return Err(VrtError::LengthMismatch {
                declared,
                actual: input.len(),
            });
        }
        Ok(packet)
    }

    /// Serialize the packet into the front of `buf`, returning the number
    /// of bytes written.
    ///
    /// The packet size field must be current (see
    /// [`update_packet_size()`](Self::update_packet_size())); the
    /// serialized length is exactly the declared size.
    ///
    /// # Errors
    /// A packet that does not fit fails with [`VrtError::BufferTooSmall`]
    /// without writing anything. The encoder never truncates.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, VrtError> {
        let needed = self.header.packet_size() as usize * 4;
        if needed > buf.len() {
            return Err(VrtError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }
        let mut cursor = deku::no_std_io::Cursor::new(&mut buf[..needed]);
        let mut writer = Writer::new(&mut cursor);
        self.to_writer(&mut writer, ())?;
        writer.finalize()?;
        Ok(needed)
    }

    /// Gets a reference to the packet header.
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }
    /// Gets a mutable reference to the packet header.
    pub fn header_mut(&mut self) -> &mut PacketHeader {
        &mut self.header
    }

    /// Get the packet stream ID.
    pub fn stream_id(&self) -> Option<u32> {
        self.stream_id
    }

    /// Sets the packet's stream ID. If `None` is passed, the stream ID
    /// field will be unset.
    ///
    /// Note: if the packet type does not match after setting/unsetting,
    /// the packet type will be updated to reflect the change. For example,
    /// if you did `packet.set_stream_id(None)` on a `PacketType::SignalData`,
    /// it would change the packet to a `PacketType::SignalDataWithoutStreamId`.
    pub fn set_stream_id(&mut self, stream_id: Option<u32>) {
        self.stream_id = stream_id;
        if self.stream_id.is_some() {
            match self.header.packet_type() {
                PacketType::SignalDataWithoutStreamId => {
                    self.header.set_packet_type(PacketType::SignalData);
                }
                PacketType::ExtensionDataWithoutStreamId => {
                    self.header.set_packet_type(PacketType::ExtensionData);
                }
                _ => (),
            }
        } else {
            match self.header.packet_type() {
                PacketType::SignalData => {
                    self.header
                        .set_packet_type(PacketType::SignalDataWithoutStreamId);
                }
                PacketType::ExtensionData => {
                    self.header
                        .set_packet_type(PacketType::ExtensionDataWithoutStreamId);
                }
                _ => (),
            }
        }
    }

    /// Gets a reference to the packet class identifier.
    pub fn class_id(&self) -> Option<&ClassIdentifier> {
        self.class_id.as_ref()
    }
    /// Set the packet class identifier.
    pub fn set_class_id(&mut self, class_id: Option<ClassIdentifier>) {
        self.header.set_class_id_included(class_id.is_some());
        self.class_id = class_id;
    }

    /// Gets the integer timestamp field.
    pub fn integer_timestamp(&self) -> Option<u32> {
        self.integer_timestamp
    }
    /// Sets the integer timestamp field.
    ///
    /// When setting this field, you must also provide a [`Tsi`] mode to
    /// indicate what kind of timestamp is being represented.
    ///
    /// # Errors
    /// If a timestamp and TSI mode are passed that don't work together,
    /// this function will return an error. For example, if
    /// `timestamp = Some(123)` and `tsi = Tsi::Null`.
    pub fn set_integer_timestamp(
        &mut self,
        timestamp: Option<u32>,
        tsi: Tsi,
    ) -> Result<(), VrtError> {
        if (timestamp.is_some() && matches!(tsi, Tsi::Null))
            || (timestamp.is_none() && !matches!(tsi, Tsi::Null))
        {
            return Err(VrtError::TimestampModeMismatch);
        }
        self.integer_timestamp = timestamp;
        self.header.set_tsi(tsi);
        Ok(())
    }

    /// Gets the fractional timestamp field.
    pub fn fractional_timestamp(&self) -> Option<u64> {
        self.fractional_timestamp
    }
    /// Sets the fractional timestamp field.
    ///
    /// When setting this field, you must also provide a [`Tsf`] mode to
    /// indicate what kind of timestamp is being represented.
    ///
    /// # Errors
    /// If a timestamp and TSF mode are passed that don't work together,
    /// this function will return an error.
    pub fn set_fractional_timestamp(
        &mut self,
        timestamp: Option<u64>,
        tsf: Tsf,
    ) -> Result<(), VrtError> {
        if (timestamp.is_some() && matches!(tsf, Tsf::Null))
            || (timestamp.is_none() && !matches!(tsf, Tsf::Null))
        {
            return Err(VrtError::TimestampModeMismatch);
        }
        self.fractional_timestamp = timestamp;
        self.header.set_tsf(tsf);
        Ok(())
    }

    /// Gets a reference to the payload enumeration.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Gets a mutable reference to the payload enumeration.
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Gets a reference to the trailer.
    pub fn trailer(&self) -> Option<&Trailer> {
        self.trailer.as_ref()
    }

    /// Sets the trailer (signal data packets only — setting a trailer on
    /// other packet types has no effect on the wire). Updates the header's
    /// trailer-included indicator to match.
    pub fn set_trailer(&mut self, trailer: Option<Trailer>) {
        self.header.set_trailer_included(trailer.is_some());
        self.trailer = trailer;
    }

    /// Get the packet payload as a vector of bytes.
    ///
    /// # Errors
    /// This function should only be used with a signal data packet type.
    /// Use of this function on other packet types will return an error.
    pub fn signal_payload(&self) -> Result<Vec<u8>, VrtError> {
        Ok(self.payload.signal_data()?.payload())
    }

    /// Set the packet payload to some raw bytes (signal data only).
    ///
    /// # Errors
    /// This function should only be used with a signal data packet type.
    /// Use of this function on other packet types will return an error.
    ///
    /// Internally, the payload is represented as a vector of 32-bit
    /// integers. If you pass a payload of bytes with a length indivisible
    /// by 4, the call will return an error.
    pub fn set_signal_payload(&mut self, payload: &[u8]) -> Result<(), VrtError> {
        let sig_data = self.payload.signal_data_mut()?;
        sig_data.set_payload(payload)?;
        self.update_packet_size();
        Ok(())
    }

    /// Set the packet payload to interleaved 16-bit I/Q sample pairs
    /// (signal data only).
    ///
    /// # Errors
    /// This function should only be used with a signal data packet type
    /// and whole (I, Q) pairs.
    pub fn set_signal_samples(&mut self, samples: &[i16]) -> Result<(), VrtError> {
        let sig_data = self.payload.signal_data_mut()?;
        sig_data.set_iq_samples(samples)?;
        self.update_packet_size();
        Ok(())
    }

    /// Update the VRT packet header size field to reflect the current
    /// contents of the data structure.
    ///
    /// This function should be executed after making any changes to a
    /// packet (i.e. after any functions `set_*()`) to make sure the header
    /// size is set correctly prior to serialization.
    pub fn update_packet_size(&mut self) {
        let mut packet_size_words = self.header.prologue_size_words() as u16;
        if self.header.trailer_included() {
            packet_size_words += 1;
        }
        packet_size_words += self.payload.size_words();
        self.header.set_packet_size(packet_size_words);
    }
}
