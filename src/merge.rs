//! Cross-worker merge of partial and final reports.
//!
//! Each call takes exactly one report from every worker and folds it into a
//! [`MergedResult`]. While all workers are still streaming partials the
//! aggregate is partial. As soon as one worker is found to have finished, the
//! merge switches to the terminal phase: every other worker is drained to its
//! own final report and only finals are aggregated, so "final" is never
//! reported while some worker is still running and no final is counted twice.

use tokio::sync::mpsc;
use tracing::warn;

use crate::results::{MergedResult, Report, WorkerResult};

/// Merges one report per worker.
///
/// Returns `true` together with the aggregate once every worker has delivered
/// its final report in this call. `time` is normalized by the worker count;
/// it approximates the run's wall-clock span and is not any single worker's
/// measured duration when workers finished at markedly different times.
pub async fn merge_results(receivers: &mut [mpsc::Receiver<Report>]) -> (bool, MergedResult) {
    let mut merged = MergedResult::new();
    let mut is_final = false;

    for i in 0..receivers.len() {
        let mut report = next_report(&mut receivers[i], i).await;

        if !is_final && report.is_final() {
            is_final = true;
            merged = MergedResult::new();
            for (j, earlier) in receivers[..i].iter_mut().enumerate() {
                merged.add_result(&drain_to_final(earlier, j).await);
            }
        } else if is_final && !report.is_final() {
            report = Report::Final(drain_to_final(&mut receivers[i], i).await);
        }

        merged.add_result(report.result());
    }

    if let Ok(workers) = u32::try_from(receivers.len()) {
        if workers > 0 {
            merged.time /= workers;
        }
    }

    (is_final || receivers.is_empty(), merged)
}

/// Discards pending partial reports until the worker's final report arrives.
async fn drain_to_final(receiver: &mut mpsc::Receiver<Report>, worker_id: usize) -> WorkerResult {
    loop {
        if let Report::Final(result) = next_report(receiver, worker_id).await {
            return result;
        }
    }
}

/// A closed channel without a final report counts as an empty final report,
/// so a worker that died early cannot hang the run.
async fn next_report(receiver: &mut mpsc::Receiver<Report>, worker_id: usize) -> Report {
    match receiver.recv().await {
        Some(report) => report,
        None => {
            warn!(
                worker_id = worker_id,
                "Worker result channel closed without a final report"
            );
            Report::Final(WorkerResult::default())
        }
    }
}
