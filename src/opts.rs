/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, Command, ValueHint, value_parser};

use crate::types::parse_duration;

const ARG_VERSION: &str = "version";
const ARG_WEB_LISTEN_ADDRESS: &str = "web.listen-address";
const ARG_WEB_TELEMETRY_PATH: &str = "web.telemetry-path";
const ARG_STATSD_LISTEN_UDP: &str = "statsd.listen-udp";
const ARG_STATSD_LISTEN_TCP: &str = "statsd.listen-tcp";
const ARG_STATSD_LISTEN_UNIXGRAM: &str = "statsd.listen-unixgram";
const ARG_STATSD_UNIXSOCKET_MODE: &str = "statsd.unixsocket-mode";
const ARG_STATSD_MAPPING_CONFIG: &str = "statsd.mapping-config";
const ARG_STATSD_READ_BUFFER: &str = "statsd.read-buffer";
const ARG_STATSD_CACHE_SIZE: &str = "statsd.cache-size";
const ARG_STATSD_EVENT_QUEUE_SIZE: &str = "statsd.event-queue-size";
const ARG_STATSD_EVENT_FLUSH_THRESHOLD: &str = "statsd.event-flush-threshold";
const ARG_STATSD_EVENT_FLUSH_INTERVAL: &str = "statsd.event-flush-interval";
const ARG_DEBUG_DUMP_FSM: &str = "debug.dump-fsm";

#[derive(Debug)]
pub struct ProcArgs {
    pub web_listen_addr: SocketAddr,
    pub telemetry_path: String,
    pub listen_udp: Option<SocketAddr>,
    pub listen_tcp: Option<SocketAddr>,
    pub listen_unixgram: Option<PathBuf>,
    pub unixsocket_mode: u32,
    pub mapping_config: Option<PathBuf>,
    pub read_buffer: Option<usize>,
    pub cache_size: usize,
    pub event_queue_size: usize,
    pub event_flush_threshold: usize,
    pub event_flush_interval: Duration,
    pub dump_fsm_path: Option<PathBuf>,
}

/// Parse a listen address, accepting the `:port` shorthand for
/// all-interfaces binds.
fn parse_listen_addr(s: &str) -> anyhow::Result<SocketAddr> {
    if let Some(port_str) = s.strip_prefix(':') {
        let port: u16 = port_str
            .parse()
            .map_err(|e| anyhow!("bad port {port_str}: {e}"))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    s.parse()
        .map_err(|e| anyhow!("bad listen address {s}: {e}"))
}

fn build_cli_args() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .disable_version_flag(true)
        .arg(
            Arg::new(ARG_VERSION)
                .help("Show version")
                .action(ArgAction::SetTrue)
                .short('V')
                .long(ARG_VERSION),
        )
        .arg(
            Arg::new(ARG_WEB_LISTEN_ADDRESS)
                .help("The address on which to expose the web interface and generated Prometheus metrics")
                .num_args(1)
                .value_name("ADDRESS")
                .default_value(":9102")
                .long(ARG_WEB_LISTEN_ADDRESS),
        )
        .arg(
            Arg::new(ARG_WEB_TELEMETRY_PATH)
                .help("Path under which to expose metrics")
                .num_args(1)
                .value_name("PATH")
                .default_value("/metrics")
                .long(ARG_WEB_TELEMETRY_PATH),
        )
        .arg(
            Arg::new(ARG_STATSD_LISTEN_UDP)
                .help("The UDP address on which to receive statsd metric lines, empty disables it")
                .num_args(1)
                .value_name("ADDRESS")
                .default_value(":9125")
                .long(ARG_STATSD_LISTEN_UDP),
        )
        .arg(
            Arg::new(ARG_STATSD_LISTEN_TCP)
                .help("The TCP address on which to receive statsd metric lines, empty disables it")
                .num_args(1)
                .value_name("ADDRESS")
                .default_value(":9125")
                .long(ARG_STATSD_LISTEN_TCP),
        )
        .arg(
            Arg::new(ARG_STATSD_LISTEN_UNIXGRAM)
                .help("The unixgram socket path to receive statsd metric lines, empty disables it")
                .num_args(1)
                .value_name("PATH")
                .default_value("")
                .value_hint(ValueHint::FilePath)
                .long(ARG_STATSD_LISTEN_UNIXGRAM),
        )
        .arg(
            Arg::new(ARG_STATSD_UNIXSOCKET_MODE)
                .help("The permission mode of the unix socket, in octal")
                .num_args(1)
                .value_name("MODE")
                .default_value("755")
                .long(ARG_STATSD_UNIXSOCKET_MODE),
        )
        .arg(
            Arg::new(ARG_STATSD_MAPPING_CONFIG)
                .help("Metric mapping configuration file name")
                .num_args(1)
                .value_name("FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .long(ARG_STATSD_MAPPING_CONFIG),
        )
        .arg(
            Arg::new(ARG_STATSD_READ_BUFFER)
                .help("Size in bytes of the operating system receive buffer of the datagram sockets")
                .num_args(1)
                .value_name("BYTES")
                .value_parser(value_parser!(usize))
                .long(ARG_STATSD_READ_BUFFER),
        )
        .arg(
            Arg::new(ARG_STATSD_CACHE_SIZE)
                .help("Maximum size of the metric mapping LRU cache")
                .num_args(1)
                .value_name("COUNT")
                .default_value("1000")
                .value_parser(value_parser!(usize))
                .long(ARG_STATSD_CACHE_SIZE),
        )
        .arg(
            Arg::new(ARG_STATSD_EVENT_QUEUE_SIZE)
                .help("Size of the internal queue for processing events")
                .num_args(1)
                .value_name("COUNT")
                .default_value("10000")
                .value_parser(value_parser!(usize))
                .long(ARG_STATSD_EVENT_QUEUE_SIZE),
        )
        .arg(
            Arg::new(ARG_STATSD_EVENT_FLUSH_THRESHOLD)
                .help("Number of events to hold in queue before flushing")
                .num_args(1)
                .value_name("COUNT")
                .default_value("1000")
                .value_parser(value_parser!(usize))
                .long(ARG_STATSD_EVENT_FLUSH_THRESHOLD),
        )
        .arg(
            Arg::new(ARG_STATSD_EVENT_FLUSH_INTERVAL)
                .help("Maximum time an event batch is held before flushing")
                .num_args(1)
                .value_name("DURATION")
                .default_value("200ms")
                .long(ARG_STATSD_EVENT_FLUSH_INTERVAL),
        )
        .arg(
            Arg::new(ARG_DEBUG_DUMP_FSM)
                .help("The path to dump the internal FSM generated for glob matching as a Dot file")
                .num_args(1)
                .value_name("FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .long(ARG_DEBUG_DUMP_FSM),
        )
}

pub fn parse_clap() -> anyhow::Result<Option<ProcArgs>> {
    parse_matches(build_cli_args().get_matches())
}

fn parse_matches(args: clap::ArgMatches) -> anyhow::Result<Option<ProcArgs>> {
    if args.get_flag(ARG_VERSION) {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(None);
    }

    let web_listen_addr = args
        .get_one::<String>(ARG_WEB_LISTEN_ADDRESS)
        .map(|s| parse_listen_addr(s))
        .transpose()
        .context("bad web listen address")?
        .unwrap();

    let telemetry_path = args
        .get_one::<String>(ARG_WEB_TELEMETRY_PATH)
        .cloned()
        .unwrap();

    let parse_optional_addr = |key: &str| -> anyhow::Result<Option<SocketAddr>> {
        match args.get_one::<String>(key).map(String::as_str) {
            None | Some("") => Ok(None),
            Some(s) => parse_listen_addr(s)
                .map(Some)
                .context(format!("bad StatsD listen address for {key}")),
        }
    };
    let listen_udp = parse_optional_addr(ARG_STATSD_LISTEN_UDP)?;
    let listen_tcp = parse_optional_addr(ARG_STATSD_LISTEN_TCP)?;

    let listen_unixgram = match args
        .get_one::<String>(ARG_STATSD_LISTEN_UNIXGRAM)
        .map(String::as_str)
    {
        None | Some("") => None,
        Some(s) => Some(PathBuf::from(s)),
    };

    let mode_str = args.get_one::<String>(ARG_STATSD_UNIXSOCKET_MODE).unwrap();
    let unixsocket_mode = u32::from_str_radix(mode_str, 8)
        .map_err(|e| anyhow!("bad unix socket mode {mode_str}: {e}"))?;

    let event_flush_interval = args
        .get_one::<String>(ARG_STATSD_EVENT_FLUSH_INTERVAL)
        .map(|s| parse_duration(s))
        .transpose()
        .context("bad event flush interval")?
        .unwrap();

    Ok(Some(ProcArgs {
        web_listen_addr,
        telemetry_path,
        listen_udp,
        listen_tcp,
        listen_unixgram,
        unixsocket_mode,
        mapping_config: args.get_one::<PathBuf>(ARG_STATSD_MAPPING_CONFIG).cloned(),
        read_buffer: args.get_one::<usize>(ARG_STATSD_READ_BUFFER).copied(),
        cache_size: *args.get_one::<usize>(ARG_STATSD_CACHE_SIZE).unwrap(),
        event_queue_size: *args.get_one::<usize>(ARG_STATSD_EVENT_QUEUE_SIZE).unwrap(),
        event_flush_threshold: *args
            .get_one::<usize>(ARG_STATSD_EVENT_FLUSH_THRESHOLD)
            .unwrap(),
        event_flush_interval,
        dump_fsm_path: args.get_one::<PathBuf>(ARG_DEBUG_DUMP_FSM).cloned(),
    }))
}
