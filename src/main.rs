use std::env;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rust_loadbench::client::build_client;
use rust_loadbench::config::{Config, Mode, WorkloadKind};
use rust_loadbench::metrics::{MetricsSink, NoopMetricsSink, PushGatewaySink};
use rust_loadbench::operations::{HttpBatchWrite, HttpCounterUpdate, HttpRead, HttpWrite};
use rust_loadbench::report::{ConsoleReporter, Reporter};
use rust_loadbench::runner::run_concurrently;
use rust_loadbench::stop::StopSignal;
use rust_loadbench::worker::{run_test, Operation};
use rust_loadbench::workload::{SequentialWorkload, UniformWorkload, WorkloadGenerator};

/// Prints helpful configuration documentation.
fn print_config_help() {
    eprintln!("Configuration is read from an optional YAML file and environment variables.");
    eprintln!();
    eprintln!("  CONFIG_FILE                  - Path to a YAML config file (camelCase keys)");
    eprintln!();
    eprintln!("Environment overrides:");
    eprintln!("  BENCH_NAME                   - Run name, also the Pushgateway job");
    eprintln!("  TARGET_URL                   - Row store base URL (http:// or https://)");
    eprintln!("  MODE                         - write, batch-write, counter-update, read or");
    eprintln!("                                 counter-read (default: write)");
    eprintln!("  WORKLOAD                     - sequential or uniform (default: sequential)");
    eprintln!("  CONCURRENCY                  - Number of workers (default: 16, must be > 0)");
    eprintln!("  MAXIMUM_RATE                 - Aggregate ops/s, 0 for unlimited (default: 0)");
    eprintln!("  TEST_DURATION                - Run length: 30s, 10m, 2h (default: until done)");
    eprintln!("  REQUEST_TIMEOUT              - Per-request timeout (default: 5s)");
    eprintln!("  PARTITION_OFFSET             - First partition key (default: 0)");
    eprintln!("  PARTITION_COUNT              - Number of partitions (default: 10000)");
    eprintln!("  CLUSTERING_ROW_COUNT         - Rows per partition (default: 100)");
    eprintln!("  CLUSTERING_ROW_SIZE          - Row value size in bytes (default: 4)");
    eprintln!("  ROWS_PER_REQUEST             - Rows per batch write or read (default: 1)");
    eprintln!("  READ_SHAPE                   - default, in-restriction, upper-bound or");
    eprintln!("                                 no-lower-bound (default: default)");
    eprintln!("  MEASURE_LATENCY              - Record latency histograms (default: true)");
    eprintln!("  HISTOGRAM_LOWEST             - Lowest discernible latency (default: 50us)");
    eprintln!("  HISTOGRAM_HIGHEST            - Highest trackable latency (default: 3x timeout)");
    eprintln!("  HISTOGRAM_SIGNIFICANT_DIGITS - Histogram precision (default: 3)");
    eprintln!("  REPORT_INTERVAL              - Partial report spacing (default: 1s)");
    eprintln!("  PUSHGATEWAY_URL              - Push latency gauges to this Pushgateway");
    eprintln!("  CUSTOM_HEADERS               - Comma-separated headers (use \\, for literal commas)");
    eprintln!("  SKIP_TLS_VERIFY              - Skip TLS certificate verification (default: false)");
    eprintln!();
    eprintln!("Logging:");
    eprintln!("  RUST_LOG                     - Log filter (default: info)");
    eprintln!("  LOG_FORMAT                   - Set to 'json' for JSON logs");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn build_workload(
    config: &Config,
    worker_id: usize,
    concurrency: usize,
) -> Box<dyn WorkloadGenerator> {
    match config.workload {
        WorkloadKind::Sequential => Box::new(SequentialWorkload::for_worker(
            config.partition_offset,
            config.partition_count,
            config.clustering_row_count,
            worker_id,
            concurrency,
        )),
        WorkloadKind::Uniform => Box::new(UniformWorkload::new(
            config.partition_offset,
            config.partition_count,
            config.clustering_row_count,
            config.duration,
        )),
    }
}

fn build_operation(
    config: &Config,
    client: &reqwest::Client,
    stop: &StopSignal,
) -> Box<dyn Operation> {
    match config.mode {
        Mode::Write => Box::new(HttpWrite::new(
            client.clone(),
            &config.target_url,
            config.clustering_row_size,
        )),
        Mode::BatchWrite => Box::new(HttpBatchWrite::new(
            client.clone(),
            &config.target_url,
            config.rows_per_request,
            config.clustering_row_size,
            stop.clone(),
        )),
        Mode::CounterUpdate => Box::new(HttpCounterUpdate::new(client.clone(), &config.target_url)),
        Mode::Read => Box::new(HttpRead::new(
            client.clone(),
            &config.target_url,
            config.rows_per_request,
            config.read_shape,
        )),
        Mode::CounterRead => Box::new(HttpRead::counters(
            client.clone(),
            &config.target_url,
            config.rows_per_request,
            config.read_shape,
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}\n", e);
            print_config_help();
            std::process::exit(1);
        }
    };

    let client_result = build_client(&config.client_config())?;
    let client = client_result.client;

    config.print_summary();
    if !client_result.parsed_headers.is_empty() {
        println!(
            "Custom headers:      {} configured\n",
            client_result.parsed_headers.len()
        );
    }

    let run_options = config.run_options()?;
    let stop = StopSignal::new();

    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.stop("interrupted");
            }
        });
    }

    // Uniform workloads time themselves out; sequential ones need a timer.
    if config.workload == WorkloadKind::Sequential && !config.duration.is_zero() {
        let stop = stop.clone();
        let duration = config.duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            stop.stop("test duration elapsed");
        });
    }

    let mut metrics: Box<dyn MetricsSink> = match &config.pushgateway_url {
        Some(url) => {
            info!(url = %url, job = %config.name, "Pushing latency metrics");
            Box::new(PushGatewaySink::new(client.clone(), url, &config.name)?)
        }
        None => Box::new(NoopMetricsSink),
    };
    let mut reporter = ConsoleReporter::new();

    let result = run_concurrently(
        &run_options,
        &stop,
        metrics.as_mut(),
        &mut reporter,
        |ctx| {
            let mut workload = build_workload(&config, ctx.worker_id, ctx.concurrency);
            let mut operation = build_operation(&config, &client, &stop);
            async move { run_test(ctx, workload.as_mut(), operation.as_mut()).await }
        },
    )
    .await?;

    reporter.report_final(&result);
    Ok(())
}
