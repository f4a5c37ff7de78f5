//! Human-readable progress and summary output.

use crate::histogram::{nanos_to_ms, LatencySummary};
use crate::results::MergedResult;

/// Receives aggregates for display.
pub trait Reporter: Send {
    /// Called once per merge round while the run is in progress.
    fn report_partial(&mut self, result: &MergedResult);

    /// Called once with the terminal aggregate.
    fn report_final(&mut self, result: &MergedResult);
}

/// Prints a progress table and a final summary to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    header_printed: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn report_partial(&mut self, result: &MergedResult) {
        if !self.header_printed {
            println!("{}", format_partial_header());
            self.header_printed = true;
        }
        println!("{}", format_partial_row(result));
    }

    fn report_final(&mut self, result: &MergedResult) {
        println!("{}", format_final_summary(result));
    }
}

pub fn format_partial_header() -> String {
    let mut output = format!(
        "{:>8} {:>10} {:>10} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
        "Time", "Ops/s", "Rows/s", "Errors", "Max", "P99.9", "P99", "P95", "P90", "P50"
    );
    output.push_str(&format!(
        "{:>8} {:>10} {:>10} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
        "(s)", "", "", "", "(ms)", "(ms)", "(ms)", "(ms)", "(ms)", "(ms)"
    ));
    output.push_str(&"-".repeat(98));
    output
}

pub fn format_partial_row(result: &MergedResult) -> String {
    let mut row = format!(
        "{:>8.1} {:>10.0} {:>10.0} {:>8}",
        result.time.as_secs_f64(),
        result.operations_per_second,
        result.rows_per_second,
        result.errors
    );

    match result.latency_summary() {
        Some(latency) => row.push_str(&format!(
            " {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            nanos_to_ms(latency.max),
            nanos_to_ms(latency.p99_9),
            nanos_to_ms(latency.p99),
            nanos_to_ms(latency.p95),
            nanos_to_ms(latency.p90),
            nanos_to_ms(latency.p50),
        )),
        None => row.push_str(&format!(" {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}", "-", "-", "-", "-", "-", "-")),
    }
    row
}

pub fn format_final_summary(result: &MergedResult) -> String {
    let mut output = String::new();
    output.push_str("\n## Results\n\n");
    output.push_str(&format!(
        "{:<16} {:.2}s\n",
        "Time (avg):",
        result.time.as_secs_f64()
    ));
    output.push_str(&format!("{:<16} {}\n", "Total ops:", result.operations));
    output.push_str(&format!("{:<16} {}\n", "Total rows:", result.rows));
    output.push_str(&format!(
        "{:<16} {:.2}\n",
        "Operations/s:", result.operations_per_second
    ));
    output.push_str(&format!("{:<16} {:.2}\n", "Rows/s:", result.rows_per_second));
    output.push_str(&format!("{:<16} {}\n", "Errors:", result.errors));

    if let Some(latency) = result.latency_summary() {
        output.push_str(&format_latency_block(&latency));
    }

    if result.latency_recording_failed {
        output.push_str(
            "\nWARNING: some latencies exceeded the highest trackable histogram value \
             and were not recorded; raise the histogram upper bound.\n",
        );
    }
    output
}

fn format_latency_block(latency: &LatencySummary) -> String {
    let mut output = String::from("Latency (ms):\n");
    for (label, value) in [
        ("max", latency.max),
        ("99.9th", latency.p99_9),
        ("99th", latency.p99),
        ("95th", latency.p95),
        ("90th", latency.p90),
        ("median", latency.p50),
        ("min", latency.min),
    ] {
        output.push_str(&format!("  {:<14} {:.3}\n", label, nanos_to_ms(value)));
    }
    output.push_str(&format!("  {:<14} {:.3}\n", "mean", latency.mean / 1_000_000.0));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::HistogramConfig;
    use std::time::Duration;

    fn merged(with_latency: bool) -> MergedResult {
        let latency = with_latency.then(|| {
            let mut hist = HistogramConfig::for_timeout(Duration::from_secs(1))
                .unwrap()
                .build();
            hist.record(2_000_000).unwrap();
            hist
        });

        MergedResult {
            time: Duration::from_secs(10),
            operations: 1000,
            rows: 5000,
            operations_per_second: 100.0,
            rows_per_second: 500.0,
            errors: 3,
            latency,
            latency_recording_failed: false,
        }
    }

    #[test]
    fn test_partial_row_without_latency() {
        let row = format_partial_row(&merged(false));
        assert!(row.contains("10.0"));
        assert!(row.contains("100"));
        assert!(row.contains('-'));
    }

    #[test]
    fn test_partial_row_with_latency() {
        let row = format_partial_row(&merged(true));
        assert!(row.contains("2.00"));
        assert!(!row.contains(" -"));
    }

    #[test]
    fn test_header_columns() {
        let header = format_partial_header();
        assert!(header.contains("Ops/s"));
        assert!(header.contains("P99.9"));
    }

    #[test]
    fn test_final_summary() {
        let summary = format_final_summary(&merged(true));
        assert!(summary.contains("Total ops:"));
        assert!(summary.contains("1000"));
        assert!(summary.contains("Errors:"));
        assert!(summary.contains("median"));
        assert!(!summary.contains("WARNING"));
    }

    #[test]
    fn test_final_summary_warns_on_recording_failure() {
        let mut result = merged(false);
        result.latency_recording_failed = true;
        let summary = format_final_summary(&result);
        assert!(summary.contains("WARNING"));
        assert!(!summary.contains("Latency (ms)"));
    }
}
