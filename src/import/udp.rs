/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::collect::EventQueue;
use crate::stats;

use super::{DATAGRAM_READ_SIZE, parse_packet};

/// Bind the UDP ingest socket and spawn its reader task.
///
/// Bind and socket-option failures are startup errors. A receive error
/// at runtime means the socket is unusable, so it triggers a process
/// shutdown through `quit_sender`.
pub(crate) async fn spawn_udp(
    listen_addr: SocketAddr,
    read_buffer: Option<usize>,
    queue: Arc<EventQueue>,
    mut quit: broadcast::Receiver<()>,
    quit_sender: broadcast::Sender<()>,
) -> anyhow::Result<JoinHandle<()>> {
    let socket = UdpSocket::bind(listen_addr)
        .await
        .context(format!("failed to bind UDP socket {listen_addr}"))?;
    if let Some(size) = read_buffer {
        socket2::SockRef::from(&socket)
            .set_recv_buffer_size(size)
            .context("failed to set UDP receive buffer size")?;
    }
    info!("accepting StatsD traffic over UDP on {listen_addr}");

    let handle = tokio::spawn(async move {
        let mut buf = vec![0u8; DATAGRAM_READ_SIZE];
        loop {
            tokio::select! {
                biased;

                _ = quit.recv() => break,
                r = socket.recv_from(&mut buf) => {
                    match r {
                        Ok((len, _peer_addr)) => {
                            stats::global().add_udp_packet();
                            let mut events = Vec::new();
                            parse_packet(&buf[..len], &mut events);
                            queue.queue(events);
                        }
                        Err(e) => {
                            error!("error receiving UDP datagram on {listen_addr}: {e}");
                            let _ = quit_sender.send(());
                            break;
                        }
                    }
                }
            }
        }
        info!("stopped UDP listener on {listen_addr}");
    });
    Ok(handle)
}
