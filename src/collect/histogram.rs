/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::sync::Arc;

use super::family::MetricChild;

#[derive(Debug, Clone)]
pub(crate) struct HistogramConfig {
    /// Bucket upper bounds in seconds, strictly increasing.
    pub(crate) bounds: Arc<[f64]>,
}

/// Fixed-bucket histogram aggregator for one child.
///
/// Bucket slots hold per-bucket counts; the render path accumulates them
/// into the cumulative counts the exposition format wants.
pub(crate) struct HistogramValue {
    bounds: Arc<[f64]>,
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

impl MetricChild for HistogramValue {
    type Config = HistogramConfig;

    fn new(config: &HistogramConfig) -> Self {
        HistogramValue {
            bounds: config.bounds.clone(),
            buckets: vec![0; config.bounds.len()],
            sum: 0.0,
            count: 0,
        }
    }
}

impl HistogramValue {
    pub(crate) fn observe(&mut self, value: f64) {
        if let Some(slot) = self.bounds.iter().position(|b| value <= *b) {
            self.buckets[slot] += 1;
        }
        self.sum += value;
        self.count += 1;
    }

    pub(crate) fn bucket_counts(&self) -> &[u64] {
        &self.buckets
    }

    pub(crate) fn sum(&self) -> f64 {
        self.sum
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucketing_is_cumulative_at_render() {
        let mut h = HistogramValue::new(&HistogramConfig {
            bounds: Arc::from([0.1, 0.5, 1.0]),
        });
        h.observe(0.05);
        h.observe(0.3);
        h.observe(0.7);
        h.observe(5.0);

        assert_eq!(h.bucket_counts(), &[1, 1, 1]);
        assert_eq!(h.count(), 4);
        assert!((h.sum() - 6.05).abs() < 1e-9);
    }

    #[test]
    fn boundary_value_lands_in_its_bucket() {
        let mut h = HistogramValue::new(&HistogramConfig {
            bounds: Arc::from([0.1, 0.5]),
        });
        h.observe(0.1);
        assert_eq!(h.bucket_counts(), &[1, 0]);
    }
}
