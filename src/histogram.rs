//! Latency histograms using HDR Histogram.
//!
//! All latencies are stored in nanoseconds. A [`HistogramConfig`] fixes the
//! trackable range and precision once per run; every worker histogram and the
//! merged histogram are created from it so that merges never need resizing.
//!
//! Defaults follow the usual database-benchmark setup: 50µs lowest
//! discernible value, three times the request timeout as the highest
//! trackable value, three significant digits.

use std::time::Duration;

use hdrhistogram::Histogram;
use tracing::warn;

use crate::errors::EngineError;

pub const DEFAULT_LOWEST_DISCERNIBLE: Duration = Duration::from_micros(50);
pub const DEFAULT_SIGNIFICANT_DIGITS: u8 = 3;

/// Bounds and precision shared by every latency histogram in a run.
#[derive(Debug, Clone)]
pub struct HistogramConfig {
    highest: Duration,
    template: Histogram<u64>,
}

impl HistogramConfig {
    /// Validates the bounds by building a template histogram.
    pub fn new(
        lowest: Duration,
        highest: Duration,
        significant_digits: u8,
    ) -> Result<Self, EngineError> {
        let template = Histogram::new_with_bounds(
            duration_to_nanos(lowest),
            duration_to_nanos(highest),
            significant_digits,
        )
        .map_err(EngineError::HistogramBounds)?;

        Ok(Self { highest, template })
    }

    /// 50µs to three times `timeout`, three significant digits.
    pub fn for_timeout(timeout: Duration) -> Result<Self, EngineError> {
        Self::new(
            DEFAULT_LOWEST_DISCERNIBLE,
            timeout.saturating_mul(3),
            DEFAULT_SIGNIFICANT_DIGITS,
        )
    }

    /// A fresh, empty histogram with this configuration.
    pub fn build(&self) -> Histogram<u64> {
        Histogram::new_from(&self.template)
    }

    #[cfg(test)]
    pub fn lowest(&self) -> Duration {
        Duration::from_nanos(self.template.low())
    }

    pub fn highest(&self) -> Duration {
        self.highest
    }

    #[cfg(test)]
    pub fn significant_digits(&self) -> u8 {
        self.template.sigfig()
    }
}

/// Merges `from` into `into`, returning the number of samples that did not fit.
///
/// Histograms built from the same [`HistogramConfig`] always merge losslessly.
/// Mismatched ranges fall back to value-by-value recording so that only the
/// out-of-range samples are lost.
pub fn merge_histogram(into: &mut Histogram<u64>, from: &Histogram<u64>) -> u64 {
    if into.add(from).is_ok() {
        return 0;
    }

    let mut dropped = 0;
    for value in from.iter_recorded() {
        if into
            .record_n(value.value_iterated_to(), value.count_at_value())
            .is_err()
        {
            dropped += value.count_at_value();
        }
    }

    if dropped > 0 {
        warn!(
            dropped = dropped,
            highest_ns = into.high(),
            "Dropped latency samples while merging histograms"
        );
    }
    dropped
}

pub(crate) fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Percentile statistics for a latency histogram, in nanoseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub p99_9: u64,
}

impl LatencySummary {
    /// Returns `None` if no samples have been recorded.
    pub fn from_histogram(hist: &Histogram<u64>) -> Option<Self> {
        if hist.is_empty() {
            return None;
        }

        Some(Self {
            count: hist.len(),
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_quantile(0.50),
            p90: hist.value_at_quantile(0.90),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            p99_9: hist.value_at_quantile(0.999),
        })
    }

    /// Format statistics as a human-readable string.
    pub fn format(&self) -> String {
        format!(
            "count={}, min={:.2}ms, max={:.2}ms, mean={:.2}ms, p50={:.2}ms, p90={:.2}ms, p95={:.2}ms, p99={:.2}ms, p99.9={:.2}ms",
            self.count,
            nanos_to_ms(self.min),
            nanos_to_ms(self.max),
            self.mean / 1_000_000.0,
            nanos_to_ms(self.p50),
            nanos_to_ms(self.p90),
            nanos_to_ms(self.p95),
            nanos_to_ms(self.p99),
            nanos_to_ms(self.p99_9),
        )
    }
}

pub(crate) fn nanos_to_ms(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000.0
}
