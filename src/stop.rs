use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::error;

/// Run-wide cancellation token.
///
/// Cloned into every worker at spawn time. Once set it is never reset; workers
/// poll it at the top of each loop iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Requests that every worker stop after its current operation.
    ///
    /// Only the first caller logs the reason and prints the stopping notice;
    /// it alone gets `true` back. Later calls are no-ops.
    pub fn stop<R: Display + ?Sized>(&self, reason: &R) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }

        error!(reason = %reason, "Stopping all workers");
        println!("\nstopping");
        true
    }
}
