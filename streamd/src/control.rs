// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The control worker: a pure configuration sink and subscriber source.
//!
//! It decodes Context packets off the control socket, validates the
//! proposed radio parameters, folds them into the configuration store,
//! and registers the sender as a subscriber. It never touches the SDR
//! and never sends data packets.

use std::io;
use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use log::{debug, info, warn};
use vrt49::prelude::*;

use crate::config::ConfigUpdate;
use crate::registry::RegistryError;
use crate::streamer::Streamer;

/// Socket read timeout, so shutdown is observed within a second.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Receive loop. Returns when the streamer stops running.
pub fn run(streamer: &Streamer) {
    let socket = streamer.control_socket();
    let mut buf = [0u8; 2048];
    debug!("control worker listening");
    while streamer.is_running() {
        match socket.recv_from(&mut buf) {
            Ok((len, src)) => handle_datagram(streamer, &buf[..len], src),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(e) => warn!("control socket receive failed: {e}"),
        }
    }
    debug!("control worker stopped");
}

/// Process one datagram from `src`: decode, validate, store, register.
/// Anything wrong with the datagram is logged and dropped without
/// touching shared state.
pub fn handle_datagram(streamer: &Streamer, datagram: &[u8], src: SocketAddr) {
    let packet = match Vrt::parse(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("discarding malformed packet from {src}: {e}");
            return;
        }
    };
    let context = match packet.payload().context() {
        Ok(context) => context,
        Err(_) => {
            warn!(
                "discarding {:?} packet from {src}: control port takes context packets only",
                packet.header().packet_type()
            );
            return;
        }
    };

    let update = update_from_context(context);
    let candidate = streamer.config.current().with_update(&update);
    if let Err(e) = candidate.validate() {
        warn!("discarding invalid configuration from {src}: {e}");
        return;
    }
    if streamer.config.apply_update(&update) {
        info!(
            "retune from {src}: fc={} Hz rate={} sps bw={} Hz gain={} dB",
            candidate.center_frequency_hz,
            candidate.sample_rate_hz,
            candidate.bandwidth_hz,
            candidate.gain_db,
        );
    }

    // The sender subscribes to the data stream at the data port,
    // whatever source port its control packet left from.
    let ip = match src.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(_) => {
            warn!("ignoring IPv6 sender {src}: subscribers are IPv4 only");
            return;
        }
    };
    let addr = SocketAddrV4::new(ip, streamer.options.data_port);
    if let Err(RegistryError::Full) = streamer.registry.register(addr, streamer.now_us()) {
        warn!("subscriber registry full; ignoring {addr}");
    }
}

/// Pull the tunable fields out of a context payload. Fields the packet
/// does not carry stay `None` and keep their current value.
pub fn update_from_context(context: &Context) -> ConfigUpdate {
    ConfigUpdate {
        center_frequency_hz: context.rf_ref_freq_hz().map(|v| v.round() as u64),
        sample_rate_hz: context.sample_rate_sps().map(|v| v.round() as u32),
        bandwidth_hz: context.bandwidth_hz().map(|v| v.round() as u32),
        gain_db: context.gain_db(),
    }
}
