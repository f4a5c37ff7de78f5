//! Per-worker result accounting and the cross-worker aggregate.

use std::time::Duration;

use hdrhistogram::Histogram;

use crate::errors::EngineError;
use crate::histogram::{duration_to_nanos, merge_histogram, HistogramConfig, LatencySummary};
use crate::rate_limiter::RateLimiter;

/// One snapshot of a single worker's counters.
#[derive(Debug, Clone, Default)]
pub struct WorkerResult {
    /// Wall-clock time covered by this snapshot.
    pub elapsed: Duration,
    pub operations: u64,
    pub rows: u64,
    pub errors: u64,
    /// `None` when latency measurement is disabled.
    pub latency: Option<Histogram<u64>>,
    /// Sticky: set once any latency could not be recorded.
    pub latency_recording_failed: bool,
}

impl WorkerResult {
    fn with_histogram(histogram: Option<&HistogramConfig>) -> Self {
        Self {
            latency: histogram.map(HistogramConfig::build),
            ..Self::default()
        }
    }
}

/// What a worker sends on its result channel.
///
/// Each channel carries zero or more `Partial` reports followed by exactly one
/// `Final` report, after which the worker drops its sender.
#[derive(Debug, Clone)]
pub enum Report {
    /// Counters accumulated since the previous partial report.
    Partial(WorkerResult),
    /// Cumulative counters for the worker's whole run.
    Final(WorkerResult),
}

impl Report {
    pub fn is_final(&self) -> bool {
        matches!(self, Report::Final(_))
    }

    pub fn result(&self) -> &WorkerResult {
        match self {
            Report::Partial(result) | Report::Final(result) => result,
        }
    }

    pub fn into_result(self) -> WorkerResult {
        match self {
            Report::Partial(result) | Report::Final(result) => result,
        }
    }
}

/// Accumulates one worker's counters into a cumulative and a rolling snapshot.
///
/// Every counting call updates both snapshots. Owned by exactly one worker.
#[derive(Debug)]
pub struct ResultBuilder {
    full: WorkerResult,
    partial: WorkerResult,
    histogram: Option<HistogramConfig>,
}

impl ResultBuilder {
    /// `histogram` is `None` when latency measurement is disabled.
    pub fn new(histogram: Option<HistogramConfig>) -> Self {
        Self {
            full: WorkerResult::with_histogram(histogram.as_ref()),
            partial: WorkerResult::with_histogram(histogram.as_ref()),
            histogram,
        }
    }

    pub fn inc_ops(&mut self) {
        self.full.operations += 1;
        self.partial.operations += 1;
    }

    pub fn inc_rows(&mut self) {
        self.add_rows(1);
    }

    pub fn add_rows(&mut self, n: u64) {
        self.full.rows += n;
        self.partial.rows += n;
    }

    pub fn inc_errors(&mut self) {
        self.full.errors += 1;
        self.partial.errors += 1;
    }

    /// Records `latency` with coordinated-omission correction.
    ///
    /// When the rate limiter has a non-zero expected interval, a latency longer
    /// than that interval also back-fills the samples that requests queued
    /// behind this one would have observed. No-op when measurement is disabled.
    pub fn record_latency(
        &mut self,
        latency: Duration,
        rate_limiter: &RateLimiter,
    ) -> Result<(), EngineError> {
        let latency_ns = duration_to_nanos(latency);
        let interval = rate_limiter.expected_interval();

        let mut highest_ns = None;
        for result in [&mut self.full, &mut self.partial] {
            let Some(hist) = result.latency.as_mut() else {
                continue;
            };
            if hist.record_correct(latency_ns, interval).is_err() {
                highest_ns = Some(hist.high());
                break;
            }
        }

        match highest_ns {
            None => Ok(()),
            Some(highest_ns) => {
                self.full.latency_recording_failed = true;
                self.partial.latency_recording_failed = true;
                Err(EngineError::LatencyOutOfRange {
                    latency_ns,
                    highest_ns,
                })
            }
        }
    }

    /// Replaces the rolling snapshot with an empty one.
    ///
    /// The sticky latency-recording flag carries over.
    pub fn reset_partial(&mut self) {
        let mut fresh = WorkerResult::with_histogram(self.histogram.as_ref());
        fresh.latency_recording_failed = self.full.latency_recording_failed;
        self.partial = fresh;
    }

    /// Hands out the rolling snapshot stamped with `elapsed` and resets it.
    pub fn take_partial(&mut self, elapsed: Duration) -> WorkerResult {
        let mut partial = std::mem::take(&mut self.partial);
        self.reset_partial();
        partial.elapsed = elapsed;
        partial
    }

    /// Consumes the builder, returning the cumulative snapshot stamped with `elapsed`.
    pub fn into_final(self, elapsed: Duration) -> WorkerResult {
        let mut full = self.full;
        full.elapsed = elapsed;
        full
    }

    pub fn full(&self) -> &WorkerResult {
        &self.full
    }

    pub fn partial(&self) -> &WorkerResult {
        &self.partial
    }
}

/// Aggregate of one report per worker.
#[derive(Debug, Clone, Default)]
pub struct MergedResult {
    /// Sum of per-worker elapsed times, normalized by the merge to one worker's span.
    pub time: Duration,
    pub operations: u64,
    pub rows: u64,
    /// Sum of per-worker `operations / elapsed`.
    pub operations_per_second: f64,
    /// Sum of per-worker `rows / elapsed`.
    pub rows_per_second: f64,
    pub errors: u64,
    /// Union of all per-worker histograms; `None` when no worker measured latency.
    pub latency: Option<Histogram<u64>>,
    pub latency_recording_failed: bool,
}

impl MergedResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: &WorkerResult) {
        self.time += result.elapsed;
        self.operations += result.operations;
        self.rows += result.rows;
        self.errors += result.errors;
        self.latency_recording_failed |= result.latency_recording_failed;

        let seconds = result.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.operations_per_second += result.operations as f64 / seconds;
            self.rows_per_second += result.rows as f64 / seconds;
        }

        if let Some(hist) = &result.latency {
            let merged = self
                .latency
                .get_or_insert_with(|| Histogram::new_from(hist));
            merge_histogram(merged, hist);
        }
    }

    pub fn latency_summary(&self) -> Option<LatencySummary> {
        self.latency.as_ref().and_then(LatencySummary::from_histogram)
    }
}
