// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Drives a whole daemon instance over loopback UDP with the tone
//! device: subscribe via the control port, receive the stream, retune,
//! and shut down cleanly.

use std::net::{Ipv4Addr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use streamd::mtu;
use streamd::sdr::ToneSdr;
use streamd::streamer::{Streamer, StreamerOptions};
use vrt49::prelude::*;

fn context_bytes(
    freq_hz: Option<f64>,
    rate_sps: Option<f64>,
    bw_hz: Option<f64>,
    gain_db: Option<f64>,
) -> Vec<u8> {
    let mut packet = Vrt::new_context_packet();
    packet.set_stream_id(Some(1));
    let context = packet.payload_mut().context_mut().unwrap();
    context.set_rf_ref_freq_hz(freq_hz);
    context.set_sample_rate_sps(rate_sps);
    context.set_bandwidth_hz(bw_hz);
    context.set_gain_db(gain_db);
    packet.update_packet_size();
    packet.to_bytes().unwrap()
}

/// Receive and parse packets until `done` says so or the deadline hits.
fn recv_until<F>(receiver: &UdpSocket, packets: &mut Vec<Vrt>, deadline: Duration, mut done: F)
where
    F: FnMut(&[Vrt]) -> bool,
{
    let mut buf = [0u8; 9000];
    let start = Instant::now();
    while !done(packets) {
        assert!(
            start.elapsed() < deadline,
            "deadline hit with {} packets received",
            packets.len()
        );
        match receiver.recv_from(&mut buf) {
            Ok((len, _)) => {
                packets.push(Vrt::parse(&buf[..len]).expect("undecodable packet on data port"));
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => panic!("receive failed: {e}"),
        }
    }
}

fn data_count_of(packet: &Vrt) -> Option<u8> {
    packet
        .header()
        .packet_type()
        .is_data()
        .then(|| packet.header().packet_count())
}

#[test]
fn subscribe_stream_retune_shutdown() {
    let receiver = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let data_port = receiver.local_addr().unwrap().port();

    let streamer = Streamer::new(StreamerOptions {
        control_port: 0,
        data_port,
        data_bind_port: Some(0),
        ..StreamerOptions::default()
    })
    .unwrap();
    let control_port = streamer.control_addr().unwrap().port();

    let run_handle = {
        let streamer = streamer.clone();
        thread::spawn(move || streamer.run(Box::new(ToneSdr::new())))
    };

    // Any valid context packet on the control port subscribes its
    // sender; an empty one is a pure subscribe.
    let controller = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let control_addr = (Ipv4Addr::LOCALHOST, control_port);
    controller
        .send_to(&context_bytes(None, None, None, None), control_addr)
        .unwrap();

    let mut packets = Vec::new();
    recv_until(&receiver, &mut packets, Duration::from_secs(20), |pkts| {
        pkts.iter().filter(|p| data_count_of(p).is_some()).count() >= 100
    });

    // Every emitted packet fits the link and stays word aligned.
    let max_udp = mtu::max_datagram_bytes(mtu::DEFAULT_MTU);
    let full_payload = mtu::samples_per_packet(mtu::DEFAULT_MTU) * 4;
    for packet in &packets {
        let bytes = packet.header().packet_size() as usize * 4;
        assert!(bytes <= max_udp);
        assert_eq!(bytes % 4, 0);
    }
    // Full data packets carry exactly the MTU-sized payload of the tone.
    let sizes: Vec<usize> = packets
        .iter()
        .filter(|p| data_count_of(p).is_some())
        .map(|p| p.payload().signal_data().unwrap().payload_size_bytes())
        .collect();
    assert!(sizes.iter().any(|&s| s == full_payload));
    assert!(sizes.iter().all(|&s| s <= full_payload));

    // The 4-bit counter increments by one per data packet. Loopback can
    // still drop under load, so ask for one clean run of 16.
    let counts: Vec<u8> = packets.iter().filter_map(data_count_of).collect();
    let contiguous = counts
        .windows(2)
        .scan(1usize, |run, w| {
            *run = if w[1] == (w[0] + 1) % 16 { *run + 1 } else { 1 };
            Some(*run)
        })
        .max()
        .unwrap_or(0);
    assert!(
        contiguous >= 16,
        "no contiguous 4-bit counter run in {counts:?}"
    );

    // Periodic context packets carry the startup configuration.
    let context = packets
        .iter()
        .find_map(|p| p.payload().context().ok())
        .expect("no context packet in the stream");
    assert_eq!(context.rf_ref_freq_hz(), Some(100e6));
    assert_eq!(context.sample_rate_sps(), Some(2.5e6));

    // Retune. The first packet of the new regime is a context with the
    // new parameters, then data keeps flowing.
    controller
        .send_to(
            &context_bytes(Some(103.7e6), Some(4e6), Some(3.2e6), Some(30.0)),
            control_addr,
        )
        .unwrap();
    let already = packets.len();
    recv_until(&receiver, &mut packets, Duration::from_secs(20), |pkts| {
        pkts[already..]
            .iter()
            .any(|p| {
                p.payload()
                    .context()
                    .is_ok_and(|c| c.rf_ref_freq_hz() == Some(103.7e6))
            })
    });
    let retuned_at = packets
        .iter()
        .position(|p| {
            p.payload()
                .context()
                .is_ok_and(|c| c.rf_ref_freq_hz() == Some(103.7e6))
        })
        .unwrap();
    let retuned = packets[retuned_at].payload().context().unwrap();
    assert_eq!(retuned.sample_rate_sps(), Some(4e6));
    assert_eq!(retuned.bandwidth_hz(), Some(3.2e6));
    assert_eq!(retuned.gain_db(), Some(30.0));

    let after = packets.len();
    recv_until(&receiver, &mut packets, Duration::from_secs(20), |pkts| {
        pkts[after..].iter().any(|p| data_count_of(p).is_some())
    });

    streamer.shutdown();
    run_handle.join().unwrap().unwrap();
    assert!(streamer.stats.packets_sent.load(std::sync::atomic::Ordering::Relaxed) > 0);
    assert_eq!(streamer.registry.active_count(), 1);
}
