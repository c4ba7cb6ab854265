/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::collect::EventQueue;
use crate::stats;

use super::parse_packet;

const MAX_LINE_SIZE: u64 = 65536;

/// Bind the TCP ingest listener and spawn the accept loop. Every
/// accepted connection gets its own reader task; a read error kills only
/// that connection.
pub(crate) async fn spawn_tcp(
    listen_addr: SocketAddr,
    queue: Arc<EventQueue>,
    mut quit: broadcast::Receiver<()>,
) -> anyhow::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .context(format!("failed to bind TCP socket {listen_addr}"))?;
    info!("accepting StatsD traffic over TCP on {listen_addr}");

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = quit.recv() => break,
                r = listener.accept() => {
                    match r {
                        Ok((stream, peer_addr)) => {
                            stats::global().add_tcp_connection();
                            let queue = queue.clone();
                            tokio::spawn(async move {
                                run_connection(stream, peer_addr, queue).await;
                            });
                        }
                        Err(e) => {
                            warn!("error accepting TCP connection on {listen_addr}: {e}");
                        }
                    }
                }
            }
        }
        info!("stopped TCP listener on {listen_addr}");
    });
    Ok(handle)
}

async fn run_connection(stream: TcpStream, peer_addr: SocketAddr, queue: Arc<EventQueue>) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = match (&mut reader).take(MAX_LINE_SIZE + 1).read_until(b'\n', &mut line).await {
            Ok(n) => n,
            Err(e) => {
                stats::global().add_tcp_error();
                debug!("read from {peer_addr} failed: {e}");
                return;
            }
        };
        if n == 0 {
            return;
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        } else if n as u64 > MAX_LINE_SIZE {
            stats::global().add_tcp_too_long_line();
            debug!("read from {peer_addr} failed: line too long");
            return;
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }

        let mut events = Vec::new();
        parse_packet(&line, &mut events);
        queue.queue(events);
    }
}
