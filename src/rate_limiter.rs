use tokio::time::{self, Duration, Instant};

/// Per-worker pacing.
///
/// Each worker owns its own limiter; limiters are never shared.
#[derive(Debug, Clone)]
pub enum RateLimiter {
    /// No pacing: `wait` returns immediately.
    Unlimited,

    /// Strictly periodic schedule anchored at a start time.
    Fixed(FixedRateLimiter),
}

impl RateLimiter {
    /// Builds the limiter for one worker of a run.
    ///
    /// `maximum_rate` is the aggregate target across all `concurrency` workers;
    /// zero means unlimited. Each worker gets `1 / (rate / concurrency)` as its
    /// period and starts `ordinal / rate` later than worker zero, so the
    /// workers' schedules interleave instead of firing in bursts.
    pub fn for_worker(maximum_rate: u64, concurrency: usize, ordinal: usize) -> Self {
        if maximum_rate == 0 || concurrency == 0 {
            return RateLimiter::Unlimited;
        }

        let rate = u128::from(maximum_rate);
        let period = nanos(concurrency as u128 * NANOS_PER_SEC / rate);
        let phase_offset = nanos(ordinal as u128 * NANOS_PER_SEC / rate);

        RateLimiter::Fixed(FixedRateLimiter::new(period, Instant::now() + phase_offset))
    }

    /// Blocks until the next permitted operation time.
    pub async fn wait(&mut self) {
        match self {
            RateLimiter::Unlimited => {}
            RateLimiter::Fixed(limiter) => limiter.wait().await,
        }
    }

    /// Nominal time between operations in nanoseconds; zero when unlimited.
    ///
    /// Used as the expected interval for coordinated-omission correction.
    pub fn expected_interval(&self) -> u64 {
        match self {
            RateLimiter::Unlimited => 0,
            RateLimiter::Fixed(limiter) => limiter.expected_interval(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixedRateLimiter {
    period: Duration,
    start_time: Instant,
    completed_operations: u64,
}

impl FixedRateLimiter {
    pub fn new(period: Duration, start_time: Instant) -> Self {
        Self {
            period,
            start_time,
            completed_operations: 0,
        }
    }

    /// Sleeps until `start_time + period * n` for the n-th call.
    ///
    /// The deadline is absolute, so a late wake-up or a slow operation never
    /// shifts later deadlines; a worker that fell behind simply catches up.
    pub async fn wait(&mut self) {
        self.completed_operations += 1;
        let next_request = self.deadline_for(self.completed_operations);
        if Instant::now() < next_request {
            time::sleep_until(next_request).await;
        }
    }

    pub fn expected_interval(&self) -> u64 {
        u64::try_from(self.period.as_nanos()).unwrap_or(u64::MAX)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn completed_operations(&self) -> u64 {
        self.completed_operations
    }

    /// Deadline the next call to `wait` will sleep until.
    #[cfg(test)]
    pub fn next_deadline(&self) -> Instant {
        self.deadline_for(self.completed_operations + 1)
    }

    fn deadline_for(&self, operations: u64) -> Instant {
        self.start_time + nanos(self.period.as_nanos().saturating_mul(u128::from(operations)))
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn nanos(value: u128) -> Duration {
    Duration::from_nanos(u64::try_from(value).unwrap_or(u64::MAX))
}
