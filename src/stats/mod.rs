/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::EventKind;

#[cfg(target_os = "linux")]
pub(crate) mod procfs;

/// Reasons a StatsD sample can be rejected, one counter each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SampleError {
    MalformedLine,
    MalformedComponent,
    MalformedValue,
    IllegalSampleFactor,
    InvalidSampleFactor,
    IllegalEvent,
}

impl SampleError {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            SampleError::MalformedLine => "malformed_line",
            SampleError::MalformedComponent => "malformed_component",
            SampleError::MalformedValue => "malformed_value",
            SampleError::IllegalSampleFactor => "illegal_sample_factor",
            SampleError::InvalidSampleFactor => "invalid_sample_factor",
            SampleError::IllegalEvent => "illegal_event",
        }
    }

    const ALL: [SampleError; 6] = [
        SampleError::MalformedLine,
        SampleError::MalformedComponent,
        SampleError::MalformedValue,
        SampleError::IllegalSampleFactor,
        SampleError::InvalidSampleFactor,
        SampleError::IllegalEvent,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushReason {
    Threshold,
    Interval,
    Overflow,
}

impl FlushReason {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Threshold => "threshold",
            FlushReason::Interval => "interval",
            FlushReason::Overflow => "overflow",
        }
    }

    const ALL: [FlushReason; 3] =
        [FlushReason::Threshold, FlushReason::Interval, FlushReason::Overflow];
}

/// Process-wide operational counters, exposed on the scrape endpoint.
#[derive(Debug, Default)]
pub(crate) struct ExporterStats {
    lines: AtomicU64,
    samples: AtomicU64,
    tags: AtomicU64,
    tag_errors: AtomicU64,
    sample_errors: [AtomicU64; 6],
    udp_packets: AtomicU64,
    tcp_connections: AtomicU64,
    tcp_errors: AtomicU64,
    tcp_too_long_lines: AtomicU64,
    events: [AtomicU64; 3],
    event_conflicts: [AtomicU64; 3],
    events_unmapped: AtomicU64,
    illegal_negative_counters: AtomicU64,
    queue_flushes: [AtomicU64; 3],
    config_load_success: AtomicU64,
    config_load_failure: AtomicU64,
    loaded_mappings: AtomicU64,
    cache_length: AtomicU64,
    udp_buffer_queued: [AtomicU64; 2],
    udp_buffer_dropped: [AtomicU64; 2],
}

static STATS: ExporterStats = ExporterStats {
    lines: AtomicU64::new(0),
    samples: AtomicU64::new(0),
    tags: AtomicU64::new(0),
    tag_errors: AtomicU64::new(0),
    sample_errors: [const { AtomicU64::new(0) }; 6],
    udp_packets: AtomicU64::new(0),
    tcp_connections: AtomicU64::new(0),
    tcp_errors: AtomicU64::new(0),
    tcp_too_long_lines: AtomicU64::new(0),
    events: [const { AtomicU64::new(0) }; 3],
    event_conflicts: [const { AtomicU64::new(0) }; 3],
    events_unmapped: AtomicU64::new(0),
    illegal_negative_counters: AtomicU64::new(0),
    queue_flushes: [const { AtomicU64::new(0) }; 3],
    config_load_success: AtomicU64::new(0),
    config_load_failure: AtomicU64::new(0),
    loaded_mappings: AtomicU64::new(0),
    cache_length: AtomicU64::new(0),
    udp_buffer_queued: [const { AtomicU64::new(0) }; 2],
    udp_buffer_dropped: [const { AtomicU64::new(0) }; 2],
};

pub(crate) fn global() -> &'static ExporterStats {
    &STATS
}

fn kind_slot(kind: EventKind) -> usize {
    match kind {
        EventKind::Counter => 0,
        EventKind::Gauge => 1,
        EventKind::Timer => 2,
    }
}

const KIND_NAMES: [&str; 3] = ["counter", "gauge", "timer"];
const UDP_PROTO_NAMES: [&str; 2] = ["udp", "udp6"];

impl ExporterStats {
    pub(crate) fn add_line_received(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_sample_received(&self) {
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_tags_received(&self) {
        self.tags.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_tag_error(&self) {
        self.tag_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_sample_error(&self, reason: SampleError) {
        self.sample_errors[reason as usize].fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn sample_errors(&self, reason: SampleError) -> u64 {
        self.sample_errors[reason as usize].load(Ordering::Relaxed)
    }

    pub(crate) fn add_udp_packet(&self) {
        self.udp_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_tcp_connection(&self) {
        self.tcp_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_tcp_error(&self) {
        self.tcp_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_tcp_too_long_line(&self) {
        self.tcp_too_long_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_event(&self, kind: EventKind) {
        self.events[kind_slot(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_event_conflict(&self, kind: EventKind) {
        self.event_conflicts[kind_slot(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_event_unmapped(&self) {
        self.events_unmapped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_illegal_negative_counter(&self) {
        self.illegal_negative_counters.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn illegal_negative_counters(&self) -> u64 {
        self.illegal_negative_counters.load(Ordering::Relaxed)
    }

    pub(crate) fn add_queue_flush(&self, reason: FlushReason) {
        self.queue_flushes[reason as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_config_load(&self, success: bool) {
        if success {
            self.config_load_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.config_load_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn set_loaded_mappings(&self, count: usize) {
        self.loaded_mappings.store(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn set_cache_length(&self, len: usize) {
        self.cache_length.store(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_udp_buffer_queued(&self, proto_slot: usize, delta: u64) {
        self.udp_buffer_queued[proto_slot].fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn add_udp_buffer_dropped(&self, proto_slot: usize, delta: u64) {
        self.udp_buffer_dropped[proto_slot].fetch_add(delta, Ordering::Relaxed);
    }

    /// Render every operational metric in the exposition format.
    pub(crate) fn render(&self, buf: &mut String) {
        use crate::export::format::{write_help_type, write_plain_metric, write_single_label_metric};

        write_help_type(
            buf,
            "statsd_exporter_lines_total",
            "counter",
            "The total number of StatsD lines received.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_lines_total",
            self.lines.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_samples_total",
            "counter",
            "The total number of StatsD samples received.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_samples_total",
            self.samples.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_tags_total",
            "counter",
            "The total number of DogStatsD tag sections processed.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_tags_total",
            self.tags.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_tag_errors_total",
            "counter",
            "The number of DogStatsD tags that could not be parsed.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_tag_errors_total",
            self.tag_errors.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_sample_errors_total",
            "counter",
            "The total number of errors parsing StatsD samples.",
        );
        for reason in SampleError::ALL {
            write_single_label_metric(
                buf,
                "statsd_exporter_sample_errors_total",
                "reason",
                reason.as_str(),
                self.sample_errors[reason as usize].load(Ordering::Relaxed) as f64,
            );
        }

        write_help_type(
            buf,
            "statsd_exporter_udp_packets_total",
            "counter",
            "The total number of StatsD packets received over UDP.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_udp_packets_total",
            self.udp_packets.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_tcp_connections_total",
            "counter",
            "The total number of TCP connections handled.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_tcp_connections_total",
            self.tcp_connections.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_tcp_connection_errors_total",
            "counter",
            "The number of errors encountered reading from TCP.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_tcp_connection_errors_total",
            self.tcp_errors.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_tcp_too_long_lines_total",
            "counter",
            "The number of lines discarded due to being too long.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_tcp_too_long_lines_total",
            self.tcp_too_long_lines.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_events_total",
            "counter",
            "The total number of StatsD events processed.",
        );
        for (slot, kind) in KIND_NAMES.iter().enumerate() {
            write_single_label_metric(
                buf,
                "statsd_exporter_events_total",
                "type",
                kind,
                self.events[slot].load(Ordering::Relaxed) as f64,
            );
        }

        write_help_type(
            buf,
            "statsd_exporter_events_conflict_total",
            "counter",
            "The total number of StatsD events with conflicting names.",
        );
        for (slot, kind) in KIND_NAMES.iter().enumerate() {
            write_single_label_metric(
                buf,
                "statsd_exporter_events_conflict_total",
                "type",
                kind,
                self.event_conflicts[slot].load(Ordering::Relaxed) as f64,
            );
        }

        write_help_type(
            buf,
            "statsd_exporter_events_unmapped_total",
            "counter",
            "The total number of StatsD events no mapping was found for.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_events_unmapped_total",
            self.events_unmapped.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_illegal_negative_counters_total",
            "counter",
            "The total number of negative counter increments rejected.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_illegal_negative_counters_total",
            self.illegal_negative_counters.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_event_queue_flushed_total",
            "counter",
            "Number of times the event batch queue was flushed.",
        );
        for reason in FlushReason::ALL {
            write_single_label_metric(
                buf,
                "statsd_exporter_event_queue_flushed_total",
                "flush_reason",
                reason.as_str(),
                self.queue_flushes[reason as usize].load(Ordering::Relaxed) as f64,
            );
        }

        write_help_type(
            buf,
            "statsd_exporter_config_reloads_total",
            "counter",
            "The number of mapping configuration reloads.",
        );
        write_single_label_metric(
            buf,
            "statsd_exporter_config_reloads_total",
            "outcome",
            "success",
            self.config_load_success.load(Ordering::Relaxed) as f64,
        );
        write_single_label_metric(
            buf,
            "statsd_exporter_config_reloads_total",
            "outcome",
            "failure",
            self.config_load_failure.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_loaded_mappings",
            "gauge",
            "The current number of configured metric mappings.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_loaded_mappings",
            self.loaded_mappings.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_cache_length",
            "gauge",
            "The count of unique metrics currently cached.",
        );
        write_plain_metric(
            buf,
            "statsd_exporter_cache_length",
            self.cache_length.load(Ordering::Relaxed) as f64,
        );

        write_help_type(
            buf,
            "statsd_exporter_udp_buffer_queued_total",
            "counter",
            "Bytes observed queued in kernel UDP receive buffers.",
        );
        for (slot, proto) in UDP_PROTO_NAMES.iter().enumerate() {
            write_single_label_metric(
                buf,
                "statsd_exporter_udp_buffer_queued_total",
                "proto",
                proto,
                self.udp_buffer_queued[slot].load(Ordering::Relaxed) as f64,
            );
        }

        write_help_type(
            buf,
            "statsd_exporter_udp_buffer_dropped_total",
            "counter",
            "Datagrams dropped by the kernel on UDP receive buffers.",
        );
        for (slot, proto) in UDP_PROTO_NAMES.iter().enumerate() {
            write_single_label_metric(
                buf,
                "statsd_exporter_udp_buffer_dropped_total",
                "proto",
                proto,
                self.udp_buffer_dropped[slot].load(Ordering::Relaxed) as f64,
            );
        }
    }
}
