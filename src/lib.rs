/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use log::info;
use tokio::sync::broadcast;

pub mod opts;

mod types;
mod stats;
mod mapper;
mod import;
mod collect;
mod export;
mod signal;

use collect::{EventQueue, Exporter, MetricRegistry};
use mapper::MetricMapper;
use opts::ProcArgs;

/// Run the exporter until shutdown. Startup failures return an error and
/// map to a non-zero exit code in `main`.
pub async fn run(proc_args: ProcArgs) -> anyhow::Result<()> {
    if proc_args.listen_udp.is_none()
        && proc_args.listen_tcp.is_none()
        && proc_args.listen_unixgram.is_none()
    {
        return Err(anyhow!(
            "at least one of the UDP/TCP/unixgram listeners must be enabled"
        ));
    }

    let mapper = Arc::new(MetricMapper::new(proc_args.cache_size));
    if let Some(path) = &proc_args.mapping_config {
        mapper
            .load_file(path)
            .context("failed to load mapping config")?;
        info!("loaded mapping config from {}", path.display());
    }
    if let Some(dump_path) = &proc_args.dump_fsm_path {
        let dot = mapper.current().dump_fsm();
        std::fs::write(dump_path, dot)
            .context(format!("failed to dump FSM to {}", dump_path.display()))?;
        info!("dumped mapping FSM to {}", dump_path.display());
    }

    let registry = Arc::new(Mutex::new(MetricRegistry::new()));
    let (quit_sender, _) = broadcast::channel::<()>(8);

    let queue = EventQueue::new(proc_args.event_flush_threshold, proc_args.event_queue_size);
    queue.spawn_flush_timer(proc_args.event_flush_interval, quit_sender.subscribe());

    let mut listener_handles = Vec::new();
    if let Some(addr) = proc_args.listen_udp {
        let handle = import::spawn_udp(
            addr,
            proc_args.read_buffer,
            queue.clone(),
            quit_sender.subscribe(),
            quit_sender.clone(),
        )
        .await?;
        listener_handles.push(handle);
    }
    if let Some(addr) = proc_args.listen_tcp {
        let handle = import::spawn_tcp(addr, queue.clone(), quit_sender.subscribe()).await?;
        listener_handles.push(handle);
    }
    #[cfg(unix)]
    if let Some(path) = proc_args.listen_unixgram.clone() {
        let handle = import::spawn_unixgram(
            path,
            proc_args.unixsocket_mode,
            proc_args.read_buffer,
            queue.clone(),
            quit_sender.subscribe(),
            quit_sender.clone(),
        )
        .await?;
        listener_handles.push(handle);
    }

    let scrape_handle = export::spawn_scrape_server(
        proc_args.web_listen_addr,
        proc_args.telemetry_path.clone(),
        registry.clone(),
        quit_sender.subscribe(),
    )
    .await?;
    listener_handles.push(scrape_handle);

    if let Some(path) = proc_args.mapping_config.clone() {
        listener_handles.push(mapper::spawn_watcher(
            mapper.clone(),
            path,
            quit_sender.subscribe(),
        ));
    }

    #[cfg(target_os = "linux")]
    listener_handles.push(stats::procfs::spawn_udp_buffer_poller(
        quit_sender.subscribe(),
    ));

    let exporter = Exporter::new(mapper, registry, queue.clone());
    let exporter_handle = tokio::spawn(exporter.into_running());

    signal::wait_for_shutdown(quit_sender.subscribe()).await;
    info!("shutting down");

    let _ = quit_sender.send(());
    queue.close();

    for handle in listener_handles {
        let _ = handle.await;
    }
    let _ = exporter_handle.await;

    info!("shutdown complete");
    Ok(())
}
