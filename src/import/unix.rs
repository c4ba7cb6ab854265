/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use log::{error, info, warn};
use tokio::net::UnixDatagram;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::collect::EventQueue;
use crate::stats;

use super::{DATAGRAM_READ_SIZE, parse_packet};

/// Bind the unixgram ingest socket and spawn its reader task. The socket
/// file is created here and unlinked when the task stops.
pub(crate) async fn spawn_unixgram(
    path: PathBuf,
    socket_mode: u32,
    read_buffer: Option<usize>,
    queue: Arc<EventQueue>,
    mut quit: broadcast::Receiver<()>,
    quit_sender: broadcast::Sender<()>,
) -> anyhow::Result<JoinHandle<()>> {
    if path.exists() {
        return Err(anyhow!("unixgram socket {} already exists", path.display()));
    }

    let socket = UnixDatagram::bind(&path)
        .context(format!("failed to bind unixgram socket {}", path.display()))?;
    if let Some(size) = read_buffer {
        socket2::SockRef::from(&socket)
            .set_recv_buffer_size(size)
            .context("failed to set unixgram receive buffer size")?;
    }
    if let Err(e) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(socket_mode)) {
        warn!(
            "failed to change permission mode of {} to {socket_mode:o}: {e}",
            path.display()
        );
    }
    info!("accepting StatsD traffic over unixgram on {}", path.display());

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
                            error!("error receiving datagram on {}: {e}", path.display());
                            let _ = quit_sender.send(());
                            break;
                        }
                    }
                }
            }
        }
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("failed to unlink {}: {e}", path.display());
        }
        info!("stopped unixgram listener on {}", path.display());
    });
    Ok(handle)
}
