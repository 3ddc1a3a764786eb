// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
use deku::prelude::*;

use crate::packet_header::{PacketHeader, PacketType};
use crate::Context;
use crate::SignalData;
use crate::VrtError;

/// Generic payload enumeration. The payload format will differ depending
/// on the type of packet.
///
/// Normally, when using this enum, you'd unwrap the inner type using one
/// of the helper functions.
///
/// # Example
/// ```
/// use vrt49::prelude::*;
/// let mut packet = Vrt::new_context_packet();
/// // Safe to unwrap as you just made it a context packet above.
/// let context = packet.payload_mut().context_mut().unwrap();
/// context.set_bandwidth_hz(Some(8e6));
/// ```
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, DekuRead, DekuWrite)]
#[deku(
    endian = "endian",
    ctx = "endian: deku::ctx::Endian, packet_header: &PacketHeader",
    id = "packet_header.packet_type()"
)]
pub enum Payload {
    /// Payload for a context packet.
    #[deku(id = "PacketType::Context | PacketType::ExtensionContext")]
    Context(Context),
    /// Payload for signal data.
    #[deku(
        id = "PacketType::SignalData | PacketType::SignalDataWithoutStreamId | PacketType::ExtensionData | PacketType::ExtensionDataWithoutStreamId"
    )]
    SignalData(#[deku(ctx = "packet_header")] SignalData),
}

impl Payload {
    /// Gets a reference to the signal data payload. This "unwraps"
    /// the generic `Payload` into a `SignalData` payload.
    ///
    /// # Errors
    /// This function will return an error if run on a packet other
    /// than a signal data packet.
    pub fn signal_data(&self) -> Result<&SignalData, VrtError> {
        match self {
            Payload::SignalData(p) => Ok(p),
            _ => Err(VrtError::SignalDataOnly),
        }
    }
    /// Gets a mutable reference to the signal data payload. This "unwraps"
    /// the generic `Payload` into a `SignalData` payload.
    ///
    /// # Errors
    /// This function will return an error if run on a packet other
    /// than a signal data packet.
    pub fn signal_data_mut(&mut self) -> Result<&mut SignalData, VrtError> {
        match self {
            Payload::SignalData(p) => Ok(p),
            _ => Err(VrtError::SignalDataOnly),
        }
    }

    /// Gets a reference to the context payload. This "unwraps"
    /// the generic `Payload` into a `Context` payload.
    ///
    /// # Errors
    /// This function will return an error if run on a packet other
    /// than a context packet.
    pub fn context(&self) -> Result<&Context, VrtError> {
        match self {
            Payload::Context(p) => Ok(p),
            _ => Err(VrtError::ContextOnly),
        }
    }
    /// Gets a mutable reference to the context payload. This "unwraps"
    /// the generic `Payload` into a `Context` payload.
    ///
    /// # Errors
    /// This function will return an error if run on a packet other
    /// than a context packet.
    pub fn context_mut(&mut self) -> Result<&mut Context, VrtError> {
        match self {
            Payload::Context(p) => Ok(p),
            _ => Err(VrtError::ContextOnly),
        }
    }

    /// Gets the payload size in 32-bit words.
    pub fn size_words(&self) -> u16 {
        match self {
            Payload::SignalData(p) => p.size_words(),
            Payload::Context(p) => p.size_words(),
        }
    }
}
