/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use log::{error, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::stats;

use super::MetricMapper;

const WATCH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

async fn stat_file(path: &PathBuf) -> Option<FileStamp> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let modified = meta.modified().ok()?;
    Some(FileStamp {
        modified,
        len: meta.len(),
    })
}

/// Watch the mapping file and reload the mapper when it changes.
///
/// The path is re-stat'ed on every tick, so editors that replace the file
/// via rename keep being observed. A failed reload leaves the active
/// ruleset untouched and is only counted and logged.
pub(crate) fn spawn_watcher(
    mapper: Arc<MetricMapper>,
    path: PathBuf,
    mut quit: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = stat_file(&path).await;
        let mut interval = tokio::time::interval(WATCH_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = quit.recv() => break,
                _ = interval.tick() => {
                    let Some(cur) = stat_file(&path).await else {
                        // transient, the file may be mid-rewrite
                        continue;
                    };
                    if last == Some(cur) {
                        continue;
                    }
                    last = Some(cur);

                    info!("mapping file {} changed, attempting reload", path.display());
                    match mapper.load_file(&path) {
                        Ok(_) => {
                            stats::global().add_config_load(true);
                            info!("mapping config reloaded");
                        }
                        Err(e) => {
                            stats::global().add_config_load(false);
                            error!("error reloading mapping config: {e:?}");
                            warn!("the previous mapping config stays in force");
                        }
                    }
                }
            }
        }
    })
}
