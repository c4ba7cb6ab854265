/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use ahash::AHashMap;
use thiserror::Error;

use crate::export::format::{write_help_type, write_labeled_metric};
use crate::types::TagMap;

use super::histogram::HistogramValue;
use super::summary::SummaryValue;

#[derive(Debug, Error)]
pub(crate) enum RegistryError {
    #[error("label names do not match the registered set for this metric")]
    LabelSchemaConflict,
}

/// Per-family configuration and per-child aggregator for one metric type.
pub(crate) trait MetricChild {
    type Config;

    fn new(config: &Self::Config) -> Self;
}

#[derive(Debug, Default)]
pub(crate) struct CounterValue {
    pub(crate) value: f64,
}

impl MetricChild for CounterValue {
    type Config = ();

    fn new(_: &()) -> Self {
        CounterValue::default()
    }
}

#[derive(Debug, Default)]
pub(crate) struct GaugeValue {
    pub(crate) value: f64,
}

impl MetricChild for GaugeValue {
    type Config = ();

    fn new(_: &()) -> Self {
        GaugeValue::default()
    }
}

/// One metric family: a fixed label-name schema and the children keyed by
/// their label-value tuple. The schema is fixed at first registration.
pub(crate) struct MetricFamily<C: MetricChild> {
    help: String,
    label_names: Vec<String>,
    config: C::Config,
    children: AHashMap<Vec<String>, C>,
}

impl<C: MetricChild> MetricFamily<C> {
    fn new(help: &str, labels: &TagMap, config: C::Config) -> Self {
        MetricFamily {
            help: help.to_string(),
            label_names: labels.keys().cloned().collect(),
            config,
            children: AHashMap::new(),
        }
    }

    fn schema_matches(&self, labels: &TagMap) -> bool {
        self.label_names.len() == labels.len()
            && self.label_names.iter().zip(labels.keys()).all(|(a, b)| a == b)
    }

    fn child_mut(&mut self, labels: &TagMap) -> Result<&mut C, RegistryError> {
        if !self.schema_matches(labels) {
            return Err(RegistryError::LabelSchemaConflict);
        }
        let values: Vec<String> = labels.values().cloned().collect();
        let config = &self.config;
        Ok(self
            .children
            .entry(values)
            .or_insert_with(|| C::new(config)))
    }

    fn remove_child(&mut self, labels: &TagMap) {
        if self.schema_matches(labels) {
            let values: Vec<String> = labels.values().cloned().collect();
            self.children.remove(&values);
        }
    }
}

/// All families of one metric type, keyed by rendered metric name.
pub(crate) struct FamilyStore<C: MetricChild> {
    inner: AHashMap<String, MetricFamily<C>>,
}

impl<C: MetricChild> FamilyStore<C> {
    fn new() -> Self {
        FamilyStore {
            inner: AHashMap::new(),
        }
    }

    /// Fetch or create the child for `(name, labels)`. A later
    /// registration with a different label schema fails and leaves the
    /// existing family untouched.
    pub(crate) fn get_child<F>(
        &mut self,
        name: &str,
        labels: &TagMap,
        help: &str,
        config: F,
    ) -> Result<&mut C, RegistryError>
    where
        F: FnOnce() -> C::Config,
    {
        self.inner
            .entry(name.to_string())
            .or_insert_with(|| MetricFamily::new(help, labels, config()))
            .child_mut(labels)
    }

    pub(crate) fn remove_child(&mut self, name: &str, labels: &TagMap) {
        if let Some(family) = self.inner.get_mut(name) {
            family.remove_child(labels);
        }
    }

    #[cfg(test)]
    pub(crate) fn child(&self, name: &str, labels: &TagMap) -> Option<&C> {
        let family = self.inner.get(name)?;
        let values: Vec<String> = labels.values().cloned().collect();
        family.children.get(&values)
    }
}

/// The full set of typed metric families owned by the exporter task.
pub(crate) struct MetricRegistry {
    pub(crate) counters: FamilyStore<CounterValue>,
    pub(crate) gauges: FamilyStore<GaugeValue>,
    pub(crate) summaries: FamilyStore<SummaryValue>,
    pub(crate) histograms: FamilyStore<HistogramValue>,
}

impl MetricRegistry {
    pub(crate) fn new() -> Self {
        MetricRegistry {
            counters: FamilyStore::new(),
            gauges: FamilyStore::new(),
            summaries: FamilyStore::new(),
            histograms: FamilyStore::new(),
        }
    }

    /// Delete the child for `(name, labels)` from every family type.
    pub(crate) fn remove_stale(&mut self, name: &str, labels: &TagMap) {
        self.counters.remove_child(name, labels);
        self.gauges.remove_child(name, labels);
        self.summaries.remove_child(name, labels);
        self.histograms.remove_child(name, labels);
    }

    /// Render a snapshot of every family in the exposition format.
    pub(crate) fn render(&self, buf: &mut String) {
        for (name, family) in &self.counters.inner {
            if family.children.is_empty() {
                continue;
            }
            write_help_type(buf, name, "counter", &family.help);
            for (values, child) in &family.children {
                write_labeled_metric(
                    buf,
                    name,
                    "",
                    &family.label_names,
                    values,
                    None,
                    child.value,
                );
            }
        }

        for (name, family) in &self.gauges.inner {
            if family.children.is_empty() {
                continue;
            }
            write_help_type(buf, name, "gauge", &family.help);
            for (values, child) in &family.children {
                write_labeled_metric(
                    buf,
                    name,
                    "",
                    &family.label_names,
                    values,
                    None,
                    child.value,
                );
            }
        }

        for (name, family) in &self.summaries.inner {
            if family.children.is_empty() {
                continue;
            }
            write_help_type(buf, name, "summary", &family.help);
            for (values, child) in &family.children {
                for q in family.config.quantiles.iter() {
                    write_labeled_metric(
                        buf,
                        name,
                        "",
                        &family.label_names,
                        values,
                        Some(("quantile", *q)),
                        child.quantile_value(*q),
                    );
                }
                write_labeled_metric(
                    buf,
                    name,
                    "_sum",
                    &family.label_names,
                    values,
                    None,
                    child.sum(),
                );
                write_labeled_metric(
                    buf,
                    name,
                    "_count",
                    &family.label_names,
                    values,
                    None,
                    child.count() as f64,
                );
            }
        }

        for (name, family) in &self.histograms.inner {
            if family.children.is_empty() {
                continue;
            }
            write_help_type(buf, name, "histogram", &family.help);
            for (values, child) in &family.children {
                let mut cumulative = 0u64;
                for (bound, bucket_count) in
                    family.config.bounds.iter().zip(child.bucket_counts())
                {
                    cumulative += bucket_count;
                    write_labeled_metric(
                        buf,
                        name,
                        "_bucket",
                        &family.label_names,
                        values,
                        Some(("le", *bound)),
                        cumulative as f64,
                    );
                }
                write_labeled_metric(
                    buf,
                    name,
                    "_bucket",
                    &family.label_names,
                    values,
                    Some(("le", f64::INFINITY)),
                    child.count() as f64,
                );
                write_labeled_metric(
                    buf,
                    name,
                    "_sum",
                    &family.label_names,
                    values,
                    None,
                    child.sum(),
                );
                write_labeled_metric(
                    buf,
                    name,
                    "_count",
                    &family.label_names,
                    values,
                    None,
                    child.count() as f64,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn counter_children_by_label_values() {
        let mut store: FamilyStore<CounterValue> = FamilyStore::new();
        store
            .get_child("req", &labels(&[("path", "/a")]), "help", || ())
            .unwrap()
            .value += 1.0;
        store
            .get_child("req", &labels(&[("path", "/b")]), "help", || ())
            .unwrap()
            .value += 2.0;

        assert_eq!(
            store.child("req", &labels(&[("path", "/a")])).unwrap().value,
            1.0
        );
        assert_eq!(
            store.child("req", &labels(&[("path", "/b")])).unwrap().value,
            2.0
        );
    }

    #[test]
    fn schema_conflict_preserves_family() {
        let mut store: FamilyStore<CounterValue> = FamilyStore::new();
        store
            .get_child("req", &labels(&[("path", "/a")]), "help", || ())
            .unwrap()
            .value = 5.0;

        let r = store.get_child("req", &labels(&[("other", "x")]), "help", || ());
        assert!(r.is_err());

        // the original family and child are untouched
        assert_eq!(
            store.child("req", &labels(&[("path", "/a")])).unwrap().value,
            5.0
        );
    }

    #[test]
    fn remove_child_only_matches_same_schema() {
        let mut store: FamilyStore<GaugeValue> = FamilyStore::new();
        store
            .get_child("g", &labels(&[("a", "1")]), "help", || ())
            .unwrap()
            .value = 3.0;

        store.remove_child("g", &labels(&[("b", "1")]));
        assert!(store.child("g", &labels(&[("a", "1")])).is_some());

        store.remove_child("g", &labels(&[("a", "1")]));
        assert!(store.child("g", &labels(&[("a", "1")])).is_none());
    }

    #[test]
    fn render_counter_lines() {
        let mut registry = MetricRegistry::new();
        registry
            .counters
            .get_child("foo_bar", &TagMap::new(), "some help", || ())
            .unwrap()
            .value += 1.0;

        let mut buf = String::new();
        registry.render(&mut buf);
        assert!(buf.contains("# HELP foo_bar some help\n"));
        assert!(buf.contains("# TYPE foo_bar counter\n"));
        assert!(buf.contains("foo_bar 1\n"));
    }

    #[test]
    fn render_skips_empty_families() {
        let mut registry = MetricRegistry::new();
        registry
            .counters
            .get_child("gone", &TagMap::new(), "help", || ())
            .unwrap();
        registry.remove_stale("gone", &TagMap::new());

        let mut buf = String::new();
        registry.render(&mut buf);
        assert!(buf.is_empty());
    }
}
