/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::time::Duration;

use log::warn;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::stats;

const POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct UdpCounters {
    queued: u64,
    dropped: u64,
}

/// Sum the rx_queue and drops columns over all sockets of one
/// `/proc/net/udp`-format table. rx_queue is hexadecimal, drops decimal.
fn parse_net_udp(text: &str) -> Option<UdpCounters> {
    let mut total = UdpCounters::default();
    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 13 {
            return None;
        }

        let (_, rx_queue) = fields[4].split_once(':')?;
        total.queued += u64::from_str_radix(rx_queue, 16).ok()?;
        total.dropped += fields[12].parse::<u64>().ok()?;
    }
    Some(total)
}

fn read_net_udp(path: &str) -> Option<UdpCounters> {
    let text = std::fs::read_to_string(path).ok()?;
    parse_net_udp(&text)
}

/// Poll the kernel UDP socket tables and publish the growth of the
/// queued/dropped counters. Only non-negative deltas are added: socket
/// churn can make the sums go backwards, and that must not show up as
/// activity.
pub(crate) fn spawn_udp_buffer_poller(mut quit: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tables = ["/proc/self/net/udp", "/proc/self/net/udp6"];
        let mut last = [UdpCounters::default(); 2];
        for (slot, path) in tables.iter().enumerate() {
            last[slot] = read_net_udp(path).unwrap_or_default();
        }

        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                biased;

                _ = quit.recv() => break,
                _ = interval.tick() => {
                    for (slot, path) in tables.iter().enumerate() {
                        let Some(cur) = read_net_udp(path) else {
                            warn!("unable to parse {path}, skipping UDP buffer poll");
                            continue;
                        };
                        stats::global().add_udp_buffer_queued(
                            slot,
                            cur.queued.saturating_sub(last[slot].queued),
                        );
                        stats::global().add_udp_buffer_dropped(
                            slot,
                            cur.dropped.saturating_sub(last[slot].dropped),
                        );
                        last[slot] = cur;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops
  0: 00000000:23A6 00000000:0000 07 00000000:00000100 00:00000000 00000000     0        0 21518 2 0000000000000000 7
  1: 00000000:23A7 00000000:0000 07 00000000:00000010 00:00000000 00000000     0        0 21519 2 0000000000000000 3
";

    #[test]
    fn sums_all_sockets() {
        let counters = parse_net_udp(SAMPLE).unwrap();
        assert_eq!(counters.queued, 0x110);
        assert_eq!(counters.dropped, 10);
    }

    #[test]
    fn header_only_table() {
        let counters = parse_net_udp(
            "  sl  local_address rem_address st tx_queue rx_queue tr tm->when retrnsmt uid timeout inode ref pointer drops\n",
        )
        .unwrap();
        assert_eq!(counters, UdpCounters::default());
    }

    #[test]
    fn malformed_table_is_rejected() {
        assert!(parse_net_udp("header\nbroken line\n").is_none());
    }
}
