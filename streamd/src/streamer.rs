// SPDX-FileCopyrightText: 2026 The vrtstream Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The streamer value the workers share, plus the supervisor that runs
//! them.
//!
//! Everything mutable lives here behind its own discipline: the config
//! store and subscriber registry behind locks, statistics as atomics,
//! and the running flag the shutdown handler flips. The supervisor
//! spawns the two workers, prints the periodic report, and maps worker
//! failures to exit codes.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info};
use thiserror::Error;

use crate::config::{ConfigError, ConfigStore, SdrConfig};
use crate::control;
use crate::mtu::{self, MIN_MTU};
use crate::registry::SubscriberRegistry;
use crate::sdr::{DriverError, SdrDevice};
use crate::stats::StreamStats;
use crate::stream::{StreamWorker, WorkerError};

/// Default inbound port for Context packets.
pub const DEFAULT_CONTROL_PORT: u16 = 4990;
/// Default destination port subscribers receive the stream on.
pub const DEFAULT_DATA_PORT: u16 = 4991;
/// Stream ID stamped on every emitted packet.
pub const DEFAULT_STREAM_ID: u32 = 0x0100_0000;

/// How often the supervisor prints statistics.
const REPORT_INTERVAL: Duration = Duration::from_secs(5);
/// Supervisor wakeup granularity, so shutdown is observed promptly.
const SUPERVISOR_TICK: Duration = Duration::from_millis(250);

/// Knobs fixed at startup.
#[derive(Clone, Debug)]
pub struct StreamerOptions {
    /// Link MTU every emitted datagram must fit.
    pub mtu: usize,
    /// Port the control socket binds.
    pub control_port: u16,
    /// Destination port subscribers are registered with.
    pub data_port: u16,
    /// Bind port for the data socket. `None` binds `data_port`; tests
    /// bind an ephemeral port so a local receiver can own `data_port`.
    pub data_bind_port: Option<u16>,
    /// Stream ID for emitted packets.
    pub stream_id: u32,
    /// Radio configuration applied before streaming starts.
    pub initial: SdrConfig,
}

impl Default for StreamerOptions {
    fn default() -> Self {
        StreamerOptions {
            mtu: mtu::DEFAULT_MTU,
            control_port: DEFAULT_CONTROL_PORT,
            data_port: DEFAULT_DATA_PORT,
            data_bind_port: None,
            stream_id: DEFAULT_STREAM_ID,
            initial: SdrConfig::default(),
        }
    }
}

/// Everything that can take the daemon down, mapped to its exit code.
#[derive(Error, Debug)]
pub enum StreamerError {
    /// Refused MTU below the RFC 791 floor.
    #[error("mtu {0} below the {MIN_MTU}-byte minimum")]
    MtuTooSmall(usize),
    /// The initial configuration is outside platform bounds.
    #[error("invalid initial configuration: {0}")]
    Config(#[from] ConfigError),
    /// Socket setup or thread spawn failed.
    #[error("socket setup failed: {0}")]
    Socket(#[from] io::Error),
    /// The driver could not be brought up.
    #[error("driver initialization failed: {0}")]
    DriverInit(DriverError),
    /// The sample buffer was lost at runtime and could not be rebuilt.
    #[error("unrecoverable stream failure: {0}")]
    Runtime(DriverError),
    /// A worker thread panicked.
    #[error("worker thread panicked")]
    WorkerPanic,
}

impl StreamerError {
    /// Process exit code for this failure: 1 for initialization
    /// failures, 2 for unrecoverable runtime failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            StreamerError::Runtime(_) | StreamerError::WorkerPanic => 2,
            _ => 1,
        }
    }
}

/// Shared state of one streamer instance.
pub struct Streamer {
    /// Startup knobs.
    pub options: StreamerOptions,
    /// Radio configuration shared with the control worker.
    pub config: ConfigStore,
    /// Subscriber table shared with the control worker.
    pub registry: SubscriberRegistry,
    /// Stream worker statistics.
    pub stats: StreamStats,
    running: AtomicBool,
    epoch: Instant,
    control_socket: UdpSocket,
    data_socket: UdpSocket,
}

impl Streamer {
    /// Validate the options, bind both sockets, and build the shared
    /// state. Nothing streams until [`run`](Self::run).
    pub fn new(options: StreamerOptions) -> Result<Arc<Streamer>, StreamerError> {
        if options.mtu < MIN_MTU {
            return Err(StreamerError::MtuTooSmall(options.mtu));
        }
        options.initial.validate()?;

        let control_socket =
            UdpSocket::bind((Ipv4Addr::UNSPECIFIED, options.control_port))?;
        control_socket.set_read_timeout(Some(control::READ_TIMEOUT))?;
        let data_bind = options.data_bind_port.unwrap_or(options.data_port);
        let data_socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, data_bind))?;

        Ok(Arc::new(Streamer {
            config: ConfigStore::new(options.initial),
            options,
            registry: SubscriberRegistry::new(),
            stats: StreamStats::new(),
            running: AtomicBool::new(true),
            epoch: Instant::now(),
            control_socket,
            data_socket,
        }))
    }

    /// Microseconds since this streamer was created. The registry and
    /// statistics timestamps all use this clock.
    pub fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// True until shutdown is requested or a worker dies.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask both workers to wind down at their next blocking point.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// The control socket (owned by the control worker).
    pub fn control_socket(&self) -> &UdpSocket {
        &self.control_socket
    }

    /// The data socket (owned by the stream worker).
    pub fn data_socket(&self) -> &UdpSocket {
        &self.data_socket
    }

    /// Address the control socket actually bound.
    pub fn control_addr(&self) -> io::Result<SocketAddr> {
        self.control_socket.local_addr()
    }

    /// Run the streamer to completion: spawn the control and stream
    /// workers, report statistics every five seconds, and tear down on
    /// shutdown or fatal stream failure.
    pub fn run(self: &Arc<Self>, dev: Box<dyn SdrDevice>) -> Result<(), StreamerError> {
        info!(
            "streamd up: control port {}, data port {}, mtu {} ({} samples/packet)",
            self.options.control_port,
            self.options.data_port,
            self.options.mtu,
            mtu::samples_per_packet(self.options.mtu),
        );

        let control_handle = {
            let shared = Arc::clone(self);
            thread::Builder::new()
                .name("control".into())
                .spawn(move || control::run(&shared))?
        };
        let stream_handle = {
            let shared = Arc::clone(self);
            thread::Builder::new()
                .name("stream".into())
                .spawn(move || StreamWorker::new(shared, dev).run())?
        };

        let mut last_report = Instant::now();
        while self.is_running() && !stream_handle.is_finished() {
            thread::sleep(SUPERVISOR_TICK);
            if last_report.elapsed() >= REPORT_INTERVAL {
                self.report();
                last_report = Instant::now();
            }
        }

        // Either shutdown was requested or the stream worker died; wind
        // down the other worker too.
        self.shutdown();
        let stream_result = match stream_handle.join() {
            Ok(result) => result,
            Err(_) => {
                error!("stream worker panicked");
                return Err(StreamerError::WorkerPanic);
            }
        };
        if control_handle.join().is_err() {
            error!("control worker panicked");
            return Err(StreamerError::WorkerPanic);
        }
        self.report();

        match stream_result {
            Ok(()) => Ok(()),
            Err(WorkerError::Init(e)) => Err(StreamerError::DriverInit(e)),
            Err(WorkerError::Runtime(e)) => Err(StreamerError::Runtime(e)),
        }
    }

    fn report(&self) {
        let stats = &self.stats;
        let load = |counter: &std::sync::atomic::AtomicU64| counter.load(Ordering::Relaxed);
        info!(
            "stream: packets={} bytes={} contexts={} reconfigs={} send_failures={}",
            load(&stats.packets_sent),
            load(&stats.bytes_sent),
            load(&stats.contexts_sent),
            load(&stats.reconfigs),
            load(&stats.send_failures),
        );
        info!(
            "health: underflows={} overflows={} refill_failures={} timestamp_jumps={}",
            load(&stats.underflows),
            load(&stats.overflows),
            load(&stats.refill_failures),
            load(&stats.timestamp_jumps),
        );
        let iterations = load(&stats.loop_iterations);
        let min_us = load(&stats.min_loop_us);
        info!(
            "loop: iterations={} min_us={} max_us={} mean_us={}",
            iterations,
            if iterations == 0 { 0 } else { min_us },
            load(&stats.max_loop_us),
            stats.mean_loop_us(),
        );
        let subscribers = self.registry.snapshot();
        info!(
            "subscribers: {} active",
            subscribers.iter().filter(|s| s.active).count()
        );
        for sub in &subscribers {
            info!(
                "  {} active={} packets={} bytes={} failures={}/{}",
                sub.addr,
                sub.active,
                sub.packets_sent,
                sub.bytes_sent,
                sub.consecutive_failures,
                sub.total_failures,
            );
        }
    }
}
