use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::errors::EngineError;
use crate::histogram::HistogramConfig;
use crate::merge::merge_results;
use crate::metrics::MetricsSink;
use crate::rate_limiter::RateLimiter;
use crate::report::Reporter;
use crate::results::MergedResult;
use crate::stop::StopSignal;
use crate::worker::{WorkerContext, PARTIAL_REPORT_INTERVAL};

/// Settings for one benchmark run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub name: String,
    pub concurrency: usize,
    /// Aggregate operations per second across all workers; zero is unlimited.
    pub maximum_rate: u64,
    /// `None` disables latency measurement.
    pub histogram: Option<HistogramConfig>,
    pub report_interval: Duration,
}

impl RunOptions {
    pub fn new(name: impl Into<String>, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            concurrency,
            maximum_rate: 0,
            histogram: None,
            report_interval: PARTIAL_REPORT_INTERVAL,
        }
    }
}

/// Spawns `options.concurrency` workers and merges their reports until all finish.
///
/// `workload` is called once per worker with that worker's context; the
/// returned future runs as its own task and must send its reports on
/// `ctx.results`. Each round of partial results is pushed to `metrics`
/// (failures ignored) and printed through `reporter`. Returns the final
/// aggregate.
pub async fn run_concurrently<F, Fut>(
    options: &RunOptions,
    stop: &StopSignal,
    metrics: &mut dyn MetricsSink,
    reporter: &mut dyn Reporter,
    workload: F,
) -> Result<MergedResult, EngineError>
where
    F: Fn(WorkerContext) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let concurrency = options.concurrency;
    if concurrency == 0 {
        return Err(EngineError::NoWorkers);
    }

    info!(
        name = %options.name,
        concurrency = concurrency,
        maximum_rate = options.maximum_rate,
        measure_latency = options.histogram.is_some(),
        "Starting run"
    );

    let mut receivers = Vec::with_capacity(concurrency);
    let mut handles = Vec::with_capacity(concurrency);

    let start_time = Instant::now();
    for worker_id in 0..concurrency {
        let (results, receiver) = mpsc::channel(1);
        receivers.push(receiver);

        let ctx = WorkerContext {
            worker_id,
            concurrency,
            results,
            rate_limiter: RateLimiter::for_worker(options.maximum_rate, concurrency, worker_id),
            stop: stop.clone(),
            histogram: options.histogram.clone(),
            report_interval: options.report_interval,
        };
        handles.push(tokio::spawn(workload(ctx)));
    }

    let (mut is_final, mut result) = merge_results(&mut receivers).await;
    while !is_final {
        result.time = start_time.elapsed();

        if let Some(latency) = result.latency_summary() {
            if let Err(e) = metrics.publish(&latency).await {
                debug!(error = %e, "Failed to publish latency metrics");
            }
        }

        reporter.report_partial(&result);
        (is_final, result) = merge_results(&mut receivers).await;
    }

    for (worker_id, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            error!(worker_id = worker_id, error = %e, "Worker task failed");
        }
    }

    info!(
        name = %options.name,
        operations = result.operations,
        errors = result.errors,
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Run finished"
    );
    Ok(result)
}
