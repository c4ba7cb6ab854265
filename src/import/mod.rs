/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

mod statsd;
pub(crate) use statsd::parser::parse_packet;

mod udp;
pub(crate) use udp::spawn_udp;

mod tcp;
pub(crate) use tcp::spawn_tcp;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::spawn_unixgram;

/// One datagram per read, the maximum a UDP packet can carry.
pub(crate) const DATAGRAM_READ_SIZE: usize = u16::MAX as usize;
