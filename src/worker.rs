use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, error};

use crate::errors::OperationError;
use crate::histogram::HistogramConfig;
use crate::rate_limiter::RateLimiter;
use crate::results::{Report, ResultBuilder};
use crate::stop::StopSignal;
use crate::workload::WorkloadGenerator;

/// Default spacing between partial reports.
pub const PARTIAL_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Everything the orchestrator hands a worker at spawn time.
#[derive(Debug)]
pub struct WorkerContext {
    pub worker_id: usize,
    /// Number of workers in the run; with `worker_id` it picks this worker's key slice.
    pub concurrency: usize,
    pub results: mpsc::Sender<Report>,
    pub rate_limiter: RateLimiter,
    pub stop: StopSignal,
    /// `None` disables latency measurement.
    pub histogram: Option<HistogramConfig>,
    pub report_interval: Duration,
}

/// One unit of work, e.g. a single request or a batch.
///
/// Implementations count what they did through the [`ResultBuilder`]
/// (`inc_ops`, `add_rows`, ...) and return the observed request latency.
/// Errors are counted by the caller, not by the implementation.
#[async_trait]
pub trait Operation: Send {
    async fn execute(
        &mut self,
        workload: &mut dyn WorkloadGenerator,
        results: &mut ResultBuilder,
    ) -> Result<Duration, OperationError>;
}

/// Runs `operation` repeatedly until `workload` is exhausted or the run stops.
///
/// Sends a partial report roughly every `report_interval` and exactly one final
/// report on exit. Failed operations are logged and counted; they never stop
/// the loop.
pub async fn run_test(
    ctx: WorkerContext,
    workload: &mut dyn WorkloadGenerator,
    operation: &mut dyn Operation,
) {
    let WorkerContext {
        worker_id,
        concurrency,
        results,
        mut rate_limiter,
        stop,
        histogram,
        report_interval,
    } = ctx;

    debug!(
        worker_id = worker_id,
        concurrency = concurrency,
        rate_limited = rate_limiter.expected_interval() > 0,
        "Worker starting"
    );

    let mut rb = ResultBuilder::new(histogram);

    let start = Instant::now();
    let mut partial_start = start;
    while !workload.is_done() && !stop.is_stopped() {
        rate_limiter.wait().await;

        match operation.execute(workload, &mut rb).await {
            Ok(latency) => {
                // Out-of-range latencies only set the sticky flag reported at the end.
                if let Err(e) = rb.record_latency(latency, &rate_limiter) {
                    debug!(worker_id = worker_id, error = %e, "Latency not recorded");
                }
            }
            Err(e) => {
                error!(worker_id = worker_id, error = %e, "Operation failed");
                rb.inc_errors();
            }
        }

        let now = Instant::now();
        let since_partial = now.duration_since(partial_start);
        if since_partial > report_interval {
            let partial = rb.take_partial(since_partial);
            if results.send(Report::Partial(partial)).await.is_err() {
                debug!(worker_id = worker_id, "Result receiver gone, worker exiting");
                return;
            }
            partial_start = now;
        }
    }

    let elapsed = start.elapsed();
    let full = rb.into_final(elapsed);
    debug!(
        worker_id = worker_id,
        operations = full.operations,
        errors = full.errors,
        elapsed_ms = elapsed.as_millis() as u64,
        "Worker finished"
    );

    if results.send(Report::Final(full)).await.is_err() {
        debug!(worker_id = worker_id, "Result receiver gone before final report");
    }
}
