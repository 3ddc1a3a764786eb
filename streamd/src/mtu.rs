// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link-MTU-aware packet sizing.
//!
//! Every emitted datagram must fit the link MTU with the IP and UDP
//! headers on — fragmentation of a well-formed packet is a bug, not a
//! transport detail.

/// IPv4 header bytes assumed per datagram.
pub const IP_HEADER_BYTES: usize = 20;
/// UDP header bytes per datagram.
pub const UDP_HEADER_BYTES: usize = 8;
/// VRT bytes around a data payload: header, stream ID, integer and
/// fractional timestamps, trailer.
pub const VITA_OVERHEAD_BYTES: usize = 24;

/// Smallest MTU the streamer will start with (RFC 791 minimum reassembly).
pub const MIN_MTU: usize = 576;
/// Standard Ethernet MTU.
pub const DEFAULT_MTU: usize = 1500;
/// Jumbo-frame MTU selected by `--jumbo`.
pub const JUMBO_MTU: usize = 9000;

/// Largest UDP payload that fits the link without fragmenting.
pub fn max_datagram_bytes(mtu: usize) -> usize {
    mtu - IP_HEADER_BYTES - UDP_HEADER_BYTES
}

/// I/Q sample pairs per data packet for a link MTU.
///
/// Each pair is four bytes. The count is rounded down to an even number
/// so the payload stays a multiple of eight bytes.
pub fn samples_per_packet(mtu: usize) -> usize {
    let samples = (max_datagram_bytes(mtu) - VITA_OVERHEAD_BYTES) / 4;
    samples & !1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_link_sizes() {
        assert_eq!(samples_per_packet(MIN_MTU), 130);
        assert_eq!(samples_per_packet(DEFAULT_MTU), 362);
        assert_eq!(samples_per_packet(JUMBO_MTU), 2236);
    }

    #[test]
    fn sized_packets_never_fragment() {
        for mtu in [576, 1492, 1500, 9000] {
            let samples = samples_per_packet(mtu);
            assert_eq!(samples % 2, 0);
            let packet_bytes = samples * 4 + VITA_OVERHEAD_BYTES;
            assert!(packet_bytes <= mtu - IP_HEADER_BYTES - UDP_HEADER_BYTES);
            assert_eq!(packet_bytes % 4, 0);
            // No room for even one more pair.
            assert!(packet_bytes + 8 > max_datagram_bytes(mtu));
        }
    }
}
