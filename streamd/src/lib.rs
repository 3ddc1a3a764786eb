// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-device VITA 49.0 I/Q streamer.
//!
//! Two long-running workers share a [`streamer::Streamer`]: the control
//! worker sinks Context packets into the configuration store and
//! registers their senders as subscribers, while the stream worker owns
//! the SDR buffer, packetizes samples, and fans them out. The wire
//! format lives in the `vrt49` crate.

pub mod config;
pub mod control;
pub mod mtu;
pub mod registry;
pub mod sdr;
pub mod stats;
pub mod stream;
pub mod streamer;
