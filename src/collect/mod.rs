/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ahash::{AHashMap, RandomState};
use log::debug;

use crate::mapper::{MapDecision, MetricMapper, ResolvedMapping};
use crate::mapper::rule::{RuleAction, TimerKind};
use crate::stats;
use crate::types::{Event, TagMap, escape_metric_name};

mod family;
pub(crate) use family::MetricRegistry;
use family::RegistryError;

mod summary;
use summary::SummaryConfig;

mod histogram;
use histogram::HistogramConfig;

mod queue;
pub(crate) use queue::EventQueue;

pub(crate) const DEFAULT_HELP: &str = "Metric autogenerated by statsd_exporter.";

const EVICT_INTERVAL: Duration = Duration::from_secs(1);

/// Tracks when a label-value tuple of a metric was last observed, for
/// time-to-live eviction. A zero ttl never expires.
struct LabelValueRecord {
    labels: TagMap,
    ttl: Duration,
    last_update: Instant,
}

/// The single consumer of the event queue. All mutation of metric
/// families and label-value records happens on this task; scrape
/// handlers only take the registry lock to render.
pub(crate) struct Exporter {
    mapper: Arc<MetricMapper>,
    registry: Arc<Mutex<MetricRegistry>>,
    queue: Arc<EventQueue>,
    label_values: AHashMap<String, AHashMap<u64, LabelValueRecord>>,
    hash_state: RandomState,
}

impl Exporter {
    pub(crate) fn new(
        mapper: Arc<MetricMapper>,
        registry: Arc<Mutex<MetricRegistry>>,
        queue: Arc<EventQueue>,
    ) -> Self {
        Exporter {
            mapper,
            registry,
            queue,
            label_values: AHashMap::new(),
            hash_state: RandomState::new(),
        }
    }

    /// Consume batches until the queue is closed and drained, evicting
    /// stale children on a one-second tick.
    pub(crate) async fn into_running(mut self) {
        let mut evict_interval = tokio::time::interval(EVICT_INTERVAL);
        evict_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                batch = self.queue.next_batch() => {
                    let Some(events) = batch else {
                        debug!("event queue closed, exporter exits");
                        break;
                    };
                    self.handle_events(events);
                }
                _ = evict_interval.tick() => self.remove_stale_metrics(),
            }
        }
    }

    fn handle_events(&mut self, events: Vec<Event>) {
        let registry = self.registry.clone();
        let mut registry = registry.lock().unwrap();
        for event in events {
            self.handle_event(&mut registry, event);
        }
    }

    fn handle_event(&mut self, registry: &mut MetricRegistry, event: Event) {
        let state = self.mapper.current();
        let mapping: Option<Arc<ResolvedMapping>> =
            match state.get_mapping(event.name(), event.kind()) {
                MapDecision::Match(m) => Some(m),
                MapDecision::Miss => None,
            };

        if let Some(m) = &mapping
            && m.rule.action == RuleAction::Drop
        {
            return;
        }

        let metric_name = match &mapping {
            Some(m) => escape_metric_name(&m.name).into_owned(),
            None => {
                stats::global().add_event_unmapped();
                escape_metric_name(event.name()).into_owned()
            }
        };

        let help = mapping
            .as_ref()
            .and_then(|m| m.rule.help.as_deref())
            .unwrap_or(DEFAULT_HELP);

        // the event's own tags first, rule labels win on conflict
        let mut labels = event.tags().clone();
        if let Some(m) = &mapping {
            for (k, v) in &m.labels {
                labels.insert(k.clone(), v.clone());
            }
        }

        let defaults = state.defaults();
        let ttl = mapping
            .as_ref()
            .and_then(|m| m.rule.ttl)
            .unwrap_or(defaults.ttl);

        let kind = event.kind();
        let result = match event {
            Event::Counter { value, .. } => {
                if value < 0.0 {
                    stats::global().add_illegal_negative_counter();
                    debug!("counter {metric_name} got negative value {value}");
                    return;
                }
                registry
                    .counters
                    .get_child(&metric_name, &labels, help, || ())
                    .map(|child| child.value += value)
            }
            Event::Gauge {
                value, relative, ..
            } => registry
                .gauges
                .get_child(&metric_name, &labels, help, || ())
                .map(|child| {
                    if relative {
                        child.value += value;
                    } else {
                        child.value = value;
                    }
                }),
            Event::Timer { value, .. } => {
                // statsd timers are milliseconds, the exposition expects seconds
                let seconds = value / 1000.0;
                let timer_kind = mapping
                    .as_ref()
                    .and_then(|m| m.rule.timer_kind)
                    .unwrap_or(defaults.timer_kind);
                match timer_kind {
                    TimerKind::Histogram => registry
                        .histograms
                        .get_child(&metric_name, &labels, help, || {
                            let bounds = mapping
                                .as_ref()
                                .and_then(|m| m.rule.buckets.as_deref())
                                .unwrap_or(&defaults.buckets);
                            HistogramConfig {
                                bounds: Arc::from(bounds),
                            }
                        })
                        .map(|child| child.observe(seconds)),
                    TimerKind::Summary => registry
                        .summaries
                        .get_child(&metric_name, &labels, help, || {
                            let objectives = mapping
                                .as_ref()
                                .and_then(|m| m.rule.quantiles.as_deref())
                                .unwrap_or(&defaults.quantiles);
                            let mut quantiles: Vec<f64> =
                                objectives.iter().map(|o| o.quantile).collect();
                            quantiles.sort_by(f64::total_cmp);
                            SummaryConfig { quantiles }
                        })
                        .map(|child| child.observe(seconds)),
                }
            }
        };

        match result {
            Ok(_) => {
                self.touch_label_values(&metric_name, &labels, ttl);
                stats::global().add_event(kind);
            }
            Err(RegistryError::LabelSchemaConflict) => {
                debug!(
                    "inconsistent label set for re-registered metric {metric_name}, \
                     dropping the observation"
                );
                stats::global().add_event_conflict(kind);
            }
        }
    }

    fn touch_label_values(&mut self, metric_name: &str, labels: &TagMap, ttl: Duration) {
        let hash = self.hash_state.hash_one((metric_name, labels));
        let record = self
            .label_values
            .entry(metric_name.to_string())
            .or_default()
            .entry(hash)
            .or_insert_with(|| LabelValueRecord {
                labels: labels.clone(),
                ttl,
                last_update: Instant::now(),
            });
        record.last_update = Instant::now();
        record.ttl = ttl;
    }

    fn remove_stale_metrics(&mut self) {
        let now = Instant::now();
        let registry = self.registry.clone();
        let mut registry = registry.lock().unwrap();

        for (metric_name, records) in self.label_values.iter_mut() {
            records.retain(|_, record| {
                if record.ttl.is_zero() || record.last_update + record.ttl > now {
                    return true;
                }
                registry.remove_stale(metric_name, &record.labels);
                false
            });
        }
        self.label_values.retain(|_, records| !records.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_exporter(mapping: Option<&str>, cache_size: usize) -> Exporter {
        let mapper = Arc::new(MetricMapper::new(cache_size));
        if let Some(text) = mapping {
            mapper.load_str(text).unwrap();
        }
        let registry = Arc::new(Mutex::new(MetricRegistry::new()));
        let queue = EventQueue::new(16, 1024);
        Exporter::new(mapper, registry, queue)
    }

    fn render(exporter: &Exporter) -> String {
        let mut buf = String::new();
        exporter.registry.lock().unwrap().render(&mut buf);
        buf
    }

    fn feed(exporter: &mut Exporter, packet: &[u8]) {
        let mut events = Vec::new();
        crate::import::parse_packet(packet, &mut events);
        exporter.handle_events(events);
    }

    #[test]
    fn unmapped_counter_uses_escaped_name() {
        let mut exporter = new_exporter(None, 0);
        feed(&mut exporter, b"foo.bar:1|c\n");

        let out = render(&exporter);
        assert!(out.contains("foo_bar 1\n"), "render was: {out}");
    }

    #[test]
    fn multi_sample_counter_accumulates() {
        let mut exporter = new_exporter(None, 0);
        feed(&mut exporter, b"a.b:1|c:2|c\n");

        let out = render(&exporter);
        assert!(out.contains("a_b 3\n"), "render was: {out}");
    }

    #[test]
    fn dogstatsd_tags_become_labels() {
        let mut exporter = new_exporter(None, 0);
        feed(&mut exporter, b"page.views:1|c|#env:prod,team:core");

        let out = render(&exporter);
        assert!(
            out.contains("page_views{env=\"prod\",team=\"core\"} 1\n"),
            "render was: {out}"
        );
    }

    #[test]
    fn mapped_name_with_extracted_label() {
        let mut exporter = new_exporter(
            Some(
                r#"
mappings:
  - match: "client.*.request"
    name: "client_request"
    labels:
      client: "$1"
"#,
            ),
            0,
        );
        feed(&mut exporter, b"client.mobile.request:1|c");

        let out = render(&exporter);
        assert!(
            out.contains("client_request{client=\"mobile\"} 1\n"),
            "render was: {out}"
        );
    }

    #[test]
    fn sampled_timer_summary() {
        let mut exporter = new_exporter(None, 0);
        feed(&mut exporter, b"request.api.users:42|ms|@0.1");

        let out = render(&exporter);
        assert!(
            out.contains("request_api_users_count 10\n"),
            "render was: {out}"
        );
        // 10 observations of 0.042 seconds
        assert!(
            out.contains("request_api_users_sum 0.42"),
            "render was: {out}"
        );
        assert!(out.contains("quantile=\"0.99\""), "render was: {out}");
    }

    #[test]
    fn timer_histogram_by_rule() {
        let mut exporter = new_exporter(
            Some(
                r#"
mappings:
  - match: "req.*"
    name: "req_seconds"
    timer_type: histogram
    buckets: [0.01, 0.05, 0.1]
"#,
            ),
            0,
        );
        feed(&mut exporter, b"req.users:42|ms");

        let out = render(&exporter);
        assert!(out.contains("# TYPE req_seconds histogram"), "render was: {out}");
        assert!(
            out.contains("req_seconds_bucket{le=\"0.05\"} 1\n"),
            "render was: {out}"
        );
        assert!(
            out.contains("req_seconds_bucket{le=\"0.01\"} 0\n"),
            "render was: {out}"
        );
        assert!(
            out.contains("req_seconds_bucket{le=\"+Inf\"} 1\n"),
            "render was: {out}"
        );
    }

    #[test]
    fn negative_counter_is_rejected() {
        let mut exporter = new_exporter(None, 0);
        let before = stats::global().illegal_negative_counters();
        feed(&mut exporter, b"metric.name:-5|c");
        let after = stats::global().illegal_negative_counters();

        assert_eq!(after - before, 1);
        assert!(!render(&exporter).contains("metric_name"));
    }

    #[test]
    fn gauge_set_and_relative_updates() {
        let mut exporter = new_exporter(None, 0);
        feed(&mut exporter, b"water.level:8|g\nwater.level:+2|g\nwater.level:-3|g\n");

        let out = render(&exporter);
        assert!(out.contains("water_level 7\n"), "render was: {out}");

        feed(&mut exporter, b"water.level:1|g\n");
        let out = render(&exporter);
        assert!(out.contains("water_level 1\n"), "render was: {out}");
    }

    #[test]
    fn relative_gauge_initializes_from_zero() {
        let mut exporter = new_exporter(None, 0);
        feed(&mut exporter, b"fresh.gauge:+5|g\n");

        let out = render(&exporter);
        assert!(out.contains("fresh_gauge 5\n"), "render was: {out}");
    }

    #[test]
    fn drop_rule_suppresses_events() {
        let mut exporter = new_exporter(
            Some(
                r#"
mappings:
  - match: "noisy.*"
    action: drop
"#,
            ),
            0,
        );
        feed(&mut exporter, b"noisy.thing:1|c");
        assert!(render(&exporter).is_empty());
    }

    #[test]
    fn conflicting_registration_keeps_original_family() {
        let mut exporter = new_exporter(None, 0);
        feed(&mut exporter, b"dual:1|c|#env:prod");
        feed(&mut exporter, b"dual:5|c");

        let out = render(&exporter);
        assert!(out.contains("dual{env=\"prod\"} 1\n"), "render was: {out}");
        assert!(!out.contains("dual 5"), "render was: {out}");
    }

    #[test]
    fn rule_labels_win_over_event_tags() {
        let mut exporter = new_exporter(
            Some(
                r#"
mappings:
  - match: "svc.*"
    name: "svc_metric"
    labels:
      source: "rule"
"#,
            ),
            0,
        );
        feed(&mut exporter, b"svc.a:1|c|#source:wire,extra:kept");

        let out = render(&exporter);
        assert!(
            out.contains("svc_metric{extra=\"kept\",source=\"rule\"} 1\n"),
            "render was: {out}"
        );
    }

    #[test]
    fn ttl_eviction_removes_children() {
        let mut exporter = new_exporter(
            Some(
                r#"
mappings:
  - match: "short.*"
    name: "short_lived"
    ttl: 60s
"#,
            ),
            0,
        );
        feed(&mut exporter, b"short.a:1|c");
        assert!(render(&exporter).contains("short_lived 1\n"));

        // age the record past its ttl, then run the evictor
        for records in exporter.label_values.values_mut() {
            for record in records.values_mut() {
                record.last_update = Instant::now() - Duration::from_secs(61);
            }
        }
        exporter.remove_stale_metrics();
        assert!(!render(&exporter).contains("short_lived"));
    }

    #[test]
    fn zero_ttl_never_expires() {
        let mut exporter = new_exporter(None, 0);
        feed(&mut exporter, b"keep.me:1|c");

        for records in exporter.label_values.values_mut() {
            for record in records.values_mut() {
                record.last_update = Instant::now() - Duration::from_secs(3600);
            }
        }
        exporter.remove_stale_metrics();
        assert!(render(&exporter).contains("keep_me 1\n"));
    }
}
