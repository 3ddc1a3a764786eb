// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Error types/enumerations for the `vrt49` crate.
*/

use thiserror::Error;

/// Generic `vrt49` crate error enumeration.
#[derive(Error, Debug)]
pub enum VrtError {
    /// Indicates a payload that requires whole 32-bit words was
    /// given something else.
    #[error("payload must be a multiple of 32-bit words")]
    PayloadUnaligned,
    /// Error given when a function that can only operate on signal
    /// data packets is executed on something else.
    #[error("function can only run on signal data packets")]
    SignalDataOnly,
    /// Error given when a function that can only operate on context
    /// packets is executed on something else.
    #[error("function can only run on context packets")]
    ContextOnly,
    /// Error given when attempting to set a timestamp field with a
    /// Tsi or Tsf mode that doesn't make sense.
    #[error("attempted to set timestamp field with Tsi/Tsf mode that doesn't make sense")]
    TimestampModeMismatch,
    /// Error given when an encode target buffer cannot hold the
    /// serialized packet. The encoder fails rather than truncating.
    #[error("packet of {needed} bytes does not fit in buffer of {available} bytes")]
    BufferTooSmall {
        /// Bytes the serialized packet requires.
        needed: usize,
        /// Bytes available in the target buffer.
        available: usize,
    },
    /// Error given when the header's declared packet size disagrees
    /// with the length of the buffer being decoded.
    #[error("declared packet size of {declared} bytes disagrees with buffer of {actual} bytes")]
    LengthMismatch {
        /// Bytes declared by the packet header.
        declared: usize,
        /// Bytes actually present.
        actual: usize,
    },
    /// Catch-all for input the decoder cannot make sense of: truncated
    /// buffers, reserved packet types, or CIF fields running off the end.
    #[error("malformed packet: {0}")]
    Malformed(String),
}

impl From<deku::DekuError> for VrtError {
    fn from(e: deku::DekuError) -> Self {
        VrtError::Malformed(e.to_string())
    }
}
