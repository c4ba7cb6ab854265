/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use hdrhistogram::Histogram;

use super::family::MetricChild;

/// Values are recorded in microseconds at 3 significant figures, which
/// stays inside the allowed error of the default quantile objectives.
const MICROS_PER_SECOND: f64 = 1_000_000.0;
const SIGFIG: u8 = 3;

#[derive(Debug, Clone)]
pub(crate) struct SummaryConfig {
    /// Quantiles reported on scrape, ascending.
    pub(crate) quantiles: Vec<f64>,
}

/// Streaming quantile estimator for one summary child.
pub(crate) struct SummaryValue {
    hist: Histogram<u64>,
    sum: f64,
    count: u64,
}

impl MetricChild for SummaryValue {
    type Config = SummaryConfig;

    fn new(_: &SummaryConfig) -> Self {
        SummaryValue {
            hist: Histogram::new(SIGFIG).unwrap(),
            sum: 0.0,
            count: 0,
        }
    }
}

impl SummaryValue {
    pub(crate) fn observe(&mut self, value: f64) {
        let micros = (value.max(0.0) * MICROS_PER_SECOND).round() as u64;
        let _ = self.hist.record(micros);
        self.sum += value;
        self.count += 1;
    }

    pub(crate) fn quantile_value(&self, quantile: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.hist.value_at_quantile(quantile) as f64 / MICROS_PER_SECOND
    }

    pub(crate) fn sum(&self) -> f64 {
        self.sum
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}
