/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use super::TagMap;

/// A single decoded measurement.
///
/// The kind set is closed: every variant carries exactly the data that
/// kind needs, so downstream dispatch is a plain `match`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Counter {
        name: String,
        value: f64,
        tags: TagMap,
    },
    Gauge {
        name: String,
        value: f64,
        relative: bool,
        tags: TagMap,
    },
    Timer {
        name: String,
        value: f64,
        tags: TagMap,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Counter,
    Gauge,
    Timer,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Counter => "counter",
            EventKind::Gauge => "gauge",
            EventKind::Timer => "timer",
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Counter { .. } => EventKind::Counter,
            Event::Gauge { .. } => EventKind::Gauge,
            Event::Timer { .. } => EventKind::Timer,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Event::Counter { name, .. } => name,
            Event::Gauge { name, .. } => name,
            Event::Timer { name, .. } => name,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Event::Counter { value, .. } => *value,
            Event::Gauge { value, .. } => *value,
            Event::Timer { value, .. } => *value,
        }
    }

    pub fn tags(&self) -> &TagMap {
        match self {
            Event::Counter { tags, .. } => tags,
            Event::Gauge { tags, .. } => tags,
            Event::Timer { tags, .. } => tags,
        }
    }
}
