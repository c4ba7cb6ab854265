/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use log::debug;

use crate::stats::{self, SampleError};
use crate::types::Event;

mod line;
use line::LineParser;

/// Decode one received packet into events.
///
/// A packet is one datagram or one stream line. Lines are parsed
/// independently; a malformed line never affects the lines after it.
/// This function does not fail: every error is counted and skipped.
pub(crate) fn parse_packet(packet: &[u8], events: &mut Vec<Event>) {
    let Ok(text) = std::str::from_utf8(packet) else {
        stats::global().add_sample_error(SampleError::MalformedLine);
        debug!("received packet with invalid utf-8");
        return;
    };

    for line in text.split('\n') {
        if line.is_empty() {
            continue;
        }
        stats::global().add_line_received();
        LineParser::new(line).parse_into(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;

    fn parse(buf: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        parse_packet(buf, &mut events);
        events
    }

    #[test]
    fn etsy_statsd() {
        let events = parse(b"gorets:1|c\n\ngaugor:333|g\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), EventKind::Counter);
        assert_eq!(events[0].name(), "gorets");
        assert_eq!(events[0].value(), 1.0);
        assert_eq!(events[1].kind(), EventKind::Gauge);
        assert_eq!(events[1].value(), 333.0);
    }

    #[test]
    fn multi_sample_line() {
        let events = parse(b"a.b:1|c:2|c\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value(), 1.0);
        assert_eq!(events[1].value(), 2.0);
    }

    #[test]
    fn dogstatsd_tags_disable_multi_sample() {
        let events = parse(b"page.views:1|c|#env:prod,team:core");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tags().get("env").map(String::as_str), Some("prod"));
        assert_eq!(events[0].tags().get("team").map(String::as_str), Some("core"));
    }

    #[test]
    fn counter_sampling_factor_scales_value() {
        let events = parse(b"req:1|c|@0.1");
        assert_eq!(events.len(), 1);
        assert!((events[0].value() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn timer_sampling_factor_repeats_events() {
        let events = parse(b"request.api.users:42|ms|@0.1");
        assert_eq!(events.len(), 10);
        for ev in &events {
            assert_eq!(ev.kind(), EventKind::Timer);
            assert_eq!(ev.value(), 42.0);
        }
    }

    #[test]
    fn zero_sampling_factor_means_one() {
        let events = parse(b"req:7|c|@0");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value(), 7.0);
    }

    #[test]
    fn malformed_line_does_not_affect_others() {
        let events = parse(b"ok.one:1|c\nnot a line\nok.two:2|c\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "ok.one");
        assert_eq!(events[1].name(), "ok.two");
    }

    #[test]
    fn relative_gauges() {
        let events = parse(b"g1:+5|g\ng2:-3|g\ng3:8|g\n");
        assert_eq!(events.len(), 3);
        let relative = |ev: &Event| match ev {
            Event::Gauge { relative, .. } => *relative,
            _ => panic!("not a gauge"),
        };
        assert!(relative(&events[0]));
        assert_eq!(events[0].value(), 5.0);
        assert!(relative(&events[1]));
        assert_eq!(events[1].value(), -3.0);
        assert!(!relative(&events[2]));
    }

    #[test]
    fn sets_are_rejected() {
        let before = stats::global().sample_errors(SampleError::IllegalEvent);
        let events = parse(b"visitors:42|s\n");
        assert!(events.is_empty());
        let after = stats::global().sample_errors(SampleError::IllegalEvent);
        assert_eq!(after - before, 1);
    }

    #[test]
    fn bad_value_is_counted_and_skipped() {
        let before = stats::global().sample_errors(SampleError::MalformedValue);
        let events = parse(b"m:abc|c\nm:1|c\n");
        assert_eq!(events.len(), 1);
        let after = stats::global().sample_errors(SampleError::MalformedValue);
        assert_eq!(after - before, 1);
    }

    #[test]
    fn histogram_type_maps_to_timer() {
        let events = parse(b"lat:12.5|h");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::Timer);
        assert_eq!(events[0].value(), 12.5);
    }

    #[test]
    fn invalid_utf8_packet_yields_nothing() {
        let events = parse(b"ok:1|c\xff\xfe\n");
        assert!(events.is_empty());
    }
}
