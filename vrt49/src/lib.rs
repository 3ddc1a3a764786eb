// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! vrt49 parses and generates VITA Radio Transport (VRT) packets as defined
//! by ANSI/VITA-49.0: Signal Data packets carrying interleaved I/Q samples
//! and Context packets carrying radio state keyed by a Context Indicator
//! Field (CIF) bitmask.
//!
//! All multi-byte fields are big-endian on the wire. Serialization is fully
//! declarative (via `deku`), so no field is ever read or written through a
//! misaligned pointer.
#![deny(missing_docs)]
#![deny(unstable_features, unused_import_braces, unreachable_pub)]
#![warn(rustdoc::unescaped_backticks)]
#![forbid(unsafe_code)]

mod cif0;
mod class_id;
mod context;
mod errors;
mod gain;
mod packet_header;
mod payload;
mod signal_data;
mod state_events;
mod trailer;
mod vrt;

// Public exports
pub use crate::cif0::Cif0;
pub use crate::class_id::ClassIdentifier;
pub use crate::context::Context;
pub use crate::errors::VrtError;
pub use crate::gain::Gain;
pub use crate::packet_header::*;
pub use crate::payload::Payload;
pub use crate::signal_data::SignalData;
pub use crate::state_events::StateEvents;
pub use crate::trailer::Trailer;
pub use crate::vrt::Vrt;

/// Standard imports for the most commonly used structures and
/// traits in the vrt49 crate.
pub mod prelude {
    pub use crate::cif0::Cif0;
    pub use crate::class_id::ClassIdentifier;
    pub use crate::context::Context;
    pub use crate::errors::VrtError;
    pub use crate::gain::Gain;
    pub use crate::packet_header::*;
    pub use crate::payload::Payload;
    pub use crate::signal_data::SignalData;
    pub use crate::state_events::StateEvents;
    pub use crate::trailer::Trailer;
    pub use crate::vrt::Vrt;
    pub use deku::writer::Writer;
    pub use deku::{DekuContainerRead, DekuContainerWrite, DekuReader, DekuWriter};
}
