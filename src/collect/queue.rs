/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::warn;
use tokio::sync::{Notify, broadcast};

use crate::stats::{self, FlushReason};
use crate::types::Event;

/// Batches parsed events between the listener tasks and the single
/// exporter consumer.
///
/// A batch is sealed once `threshold` events accumulate or the flush
/// timer fires. Enqueueing never blocks a producer: when the buffered
/// event count exceeds `capacity` the oldest sealed batch is dropped and
/// counted. Events of one packet stay ordered within their batch.
pub(crate) struct EventQueue {
    shared: Mutex<QueueShared>,
    notify: Notify,
    threshold: usize,
    capacity: usize,
}

struct QueueShared {
    pending: Vec<Event>,
    batches: VecDeque<Vec<Event>>,
    buffered: usize,
    closed: bool,
}

impl EventQueue {
    pub(crate) fn new(threshold: usize, capacity: usize) -> Arc<Self> {
        let threshold = threshold.max(1);
        Arc::new(EventQueue {
            shared: Mutex::new(QueueShared {
                pending: Vec::with_capacity(threshold),
                batches: VecDeque::new(),
                buffered: 0,
                closed: false,
            }),
            notify: Notify::new(),
            threshold,
            capacity: capacity.max(threshold),
        })
    }

    /// Flush on a fixed interval and seal the queue on quit.
    pub(crate) fn spawn_flush_timer(
        self: &Arc<Self>,
        interval: Duration,
        mut quit: broadcast::Receiver<()>,
    ) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    biased;

                    _ = quit.recv() => {
                        queue.close();
                        break;
                    }
                    _ = interval.tick() => queue.flush(FlushReason::Interval),
                }
            }
        });
    }

    pub(crate) fn queue(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let mut shared = self.shared.lock().unwrap();
        if shared.closed {
            return;
        }
        shared.pending.extend(events);
        if shared.pending.len() >= self.threshold {
            self.flush_locked(&mut shared, FlushReason::Threshold);
        }
    }

    fn flush(&self, reason: FlushReason) {
        let mut shared = self.shared.lock().unwrap();
        if !shared.pending.is_empty() {
            self.flush_locked(&mut shared, reason);
        }
    }

    fn flush_locked(&self, shared: &mut QueueShared, reason: FlushReason) {
        stats::global().add_queue_flush(reason);

        let batch = std::mem::replace(
            &mut shared.pending,
            Vec::with_capacity(self.threshold),
        );
        shared.buffered += batch.len();
        shared.batches.push_back(batch);

        while shared.buffered > self.capacity && shared.batches.len() > 1 {
            if let Some(dropped) = shared.batches.pop_front() {
                shared.buffered -= dropped.len();
                stats::global().add_queue_flush(FlushReason::Overflow);
                warn!("event queue overflow, dropped a batch of {} events", dropped.len());
            }
        }

        self.notify.notify_one();
    }

    /// Seal the queue: the pending batch becomes visible, later enqueues
    /// are discarded and consumers drain what is buffered.
    pub(crate) fn close(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.closed = true;
        if !shared.pending.is_empty() {
            let batch = std::mem::take(&mut shared.pending);
            shared.buffered += batch.len();
            shared.batches.push_back(batch);
        }
        drop(shared);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// The next sealed batch, or `None` once the queue is closed and
    /// fully drained.
    pub(crate) async fn next_batch(&self) -> Option<Vec<Event>> {
        loop {
            let notified = self.notify.notified();
            {
                let mut shared = self.shared.lock().unwrap();
                if let Some(batch) = shared.batches.pop_front() {
                    shared.buffered -= batch.len();
                    return Some(batch);
                }
                if shared.closed {
                    return None;
                }
            }
            notified.await;
        }
    }
}
