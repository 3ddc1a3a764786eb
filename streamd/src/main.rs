// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Daemon entrypoint: parse the CLI, bring up the streamer with the
//! tone device, and map failures to exit codes (0 clean shutdown,
//! 1 initialization failure, 2 unrecoverable runtime failure).

use std::process;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use streamd::config::SdrConfig;
use streamd::mtu;
use streamd::sdr::ToneSdr;
use streamd::streamer::{
    Streamer, StreamerOptions, DEFAULT_CONTROL_PORT, DEFAULT_DATA_PORT, DEFAULT_STREAM_ID,
};

#[derive(Parser, Debug)]
#[command(
    name = "streamd",
    version,
    about = "VITA 49.0 I/Q streamer for SDR-equipped embedded hosts"
)]
struct Cli {
    /// Link MTU in bytes (>= 576)
    #[arg(long, default_value_t = mtu::DEFAULT_MTU, conflicts_with = "jumbo")]
    mtu: usize,

    /// Shorthand for --mtu 9000
    #[arg(long)]
    jumbo: bool,

    /// UDP port for inbound context packets
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// UDP port subscribers receive the stream on
    #[arg(long, default_value_t = DEFAULT_DATA_PORT)]
    data_port: u16,

    /// Initial center frequency in Hz
    #[arg(long, default_value_t = 100_000_000)]
    freq: u64,

    /// Initial sample rate in samples per second
    #[arg(long, default_value_t = 2_500_000)]
    rate: u32,

    /// Initial gain in dB
    #[arg(long, default_value_t = 40.0)]
    gain: f64,

    /// Initial bandwidth in Hz (default: 80% of the sample rate)
    #[arg(long)]
    bw: Option<u32>,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();
    let cli = Cli::parse();

    let options = StreamerOptions {
        mtu: if cli.jumbo { mtu::JUMBO_MTU } else { cli.mtu },
        control_port: cli.control_port,
        data_port: cli.data_port,
        data_bind_port: None,
        stream_id: DEFAULT_STREAM_ID,
        initial: SdrConfig {
            center_frequency_hz: cli.freq,
            sample_rate_hz: cli.rate,
            bandwidth_hz: cli.bw.unwrap_or_else(|| SdrConfig::default_bandwidth(cli.rate)),
            gain_db: cli.gain,
        },
    };

    let streamer = match Streamer::new(options) {
        Ok(streamer) => streamer,
        Err(e) => {
            error!("{e}");
            process::exit(e.exit_code());
        }
    };

    {
        let streamer = streamer.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("shutdown requested");
            streamer.shutdown();
        }) {
            error!("failed to install shutdown handler: {e}");
            process::exit(1);
        }
    }

    match streamer.run(Box::new(ToneSdr::new())) {
        Ok(()) => info!("clean shutdown"),
        Err(e) => {
            error!("{e}");
            process::exit(e.exit_code());
        }
    }
}
