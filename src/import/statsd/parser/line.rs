/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use log::debug;
use memchr::memchr;

use crate::stats::{self, SampleError};
use crate::types::{Event, TagMap, parse_dogstatsd_tags};

/// Parser for a single StatsD line: `<name>:<sample>[:<sample>...]`.
pub(super) struct LineParser<'a> {
    line: &'a str,
}

impl<'a> LineParser<'a> {
    pub(super) fn new(line: &'a str) -> Self {
        LineParser { line }
    }

    pub(super) fn parse_into(&self, events: &mut Vec<Event>) {
        let Some(p) = memchr(b':', self.line.as_bytes()) else {
            stats::global().add_sample_error(SampleError::MalformedLine);
            debug!("bad StatsD line: {}", self.line);
            return;
        };
        if p == 0 {
            stats::global().add_sample_error(SampleError::MalformedLine);
            debug!("bad StatsD line: {}", self.line);
            return;
        }

        let name = &self.line[..p];
        let rest = &self.line[p + 1..];

        // DogStatsD tag sections contain ':' inside the tag values, so a
        // line carrying `|#` is always a single sample
        if rest.contains("|#") {
            stats::global().add_sample_received();
            self.parse_sample(name, rest, events);
        } else {
            for sample in rest.split(':') {
                stats::global().add_sample_received();
                self.parse_sample(name, sample, events);
            }
        }
    }

    fn parse_sample(&self, name: &str, sample: &str, events: &mut Vec<Event>) {
        let components: Vec<&str> = sample.split('|').collect();
        if components.len() < 2 || components.len() > 4 {
            stats::global().add_sample_error(SampleError::MalformedComponent);
            debug!("bad component on line: {}", self.line);
            return;
        }

        let value_str = components[0];
        let type_str = components[1];
        let relative = value_str.starts_with('+') || value_str.starts_with('-');

        let Ok(mut value) = value_str.parse::<f64>() else {
            stats::global().add_sample_error(SampleError::MalformedValue);
            debug!("bad value {value_str} on line: {}", self.line);
            return;
        };

        let mut multiply_events = 1usize;
        let mut tags = TagMap::new();

        if components.len() > 2 {
            for component in &components[2..] {
                if component.is_empty() {
                    stats::global().add_sample_error(SampleError::MalformedComponent);
                    debug!("empty component on line: {}", self.line);
                    return;
                }
            }

            for component in &components[2..] {
                match component.as_bytes()[0] {
                    b'@' => {
                        if type_str != "c" && type_str != "ms" {
                            stats::global().add_sample_error(SampleError::IllegalSampleFactor);
                            debug!(
                                "sampling factor on non-counter non-timer metric on line: {}",
                                self.line
                            );
                            continue;
                        }

                        let sampling_factor = match component[1..].parse::<f64>() {
                            Ok(f) if f != 0.0 => f,
                            Ok(_) => 1.0,
                            Err(_) => {
                                stats::global()
                                    .add_sample_error(SampleError::InvalidSampleFactor);
                                debug!(
                                    "invalid sampling factor {} on line: {}",
                                    &component[1..],
                                    self.line
                                );
                                1.0
                            }
                        };

                        if type_str == "c" {
                            value /= sampling_factor;
                        } else {
                            multiply_events = (1.0 / sampling_factor) as usize;
                        }
                    }
                    b'#' => parse_dogstatsd_tags(&component[1..], &mut tags),
                    _ => {
                        stats::global().add_sample_error(SampleError::InvalidSampleFactor);
                        debug!(
                            "invalid sampling factor or tag section {component} on line: {}",
                            self.line
                        );
                    }
                }
            }
        }

        for _ in 0..multiply_events {
            let Some(event) = build_event(type_str, name, value, relative, tags.clone()) else {
                stats::global().add_sample_error(SampleError::IllegalEvent);
                debug!("bad stat type {type_str} on line: {}", self.line);
                continue;
            };
            events.push(event);
        }
    }
}

fn build_event(
    type_str: &str,
    name: &str,
    value: f64,
    relative: bool,
    tags: TagMap,
) -> Option<Event> {
    match type_str {
        "c" => Some(Event::Counter {
            name: name.to_string(),
            value,
            tags,
        }),
        "g" => Some(Event::Gauge {
            name: name.to_string(),
            value,
            relative,
            tags,
        }),
        // "h" carries unitless histogram observations, handled the same
        // as millisecond timers
        "ms" | "h" => Some(Event::Timer {
            name: name.to_string(),
            value,
            tags,
        }),
        _ => None,
    }
}
