/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use log::info;
use tokio::sync::broadcast;

/// Wait until a shutdown condition is reached: SIGINT/SIGTERM from the
/// platform, or an internal component giving up through the quit channel.
pub(crate) async fn wait_for_shutdown(mut quit: broadcast::Receiver<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received interrupt signal"),
            _ = sigterm.recv() => info!("received terminate signal"),
            _ = quit.recv() => info!("internal shutdown requested"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received interrupt signal"),
            _ = quit.recv() => info!("internal shutdown requested"),
        }
    }
}
