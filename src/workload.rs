//! Key generation for units of work.
//!
//! A [`WorkloadGenerator`] decides which partition and clustering keys a
//! worker issues next and when it has nothing left to issue.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of keys for one worker.
pub trait WorkloadGenerator: Send {
    /// No more partitions to visit.
    fn is_done(&self) -> bool;

    /// The current partition has no more clustering rows.
    fn is_partition_done(&self) -> bool;

    fn next_partition_key(&mut self) -> i64;

    fn next_clustering_key(&mut self) -> i64;
}

/// Visits every clustering row of every partition in a range exactly once.
#[derive(Debug, Clone)]
pub struct SequentialWorkload {
    partition_end: i64,
    clustering_row_count: i64,
    next_partition: i64,
    next_clustering_row: i64,
}

impl SequentialWorkload {
    pub fn new(partition_offset: i64, partition_count: i64, clustering_row_count: i64) -> Self {
        Self {
            partition_end: partition_offset.saturating_add(partition_count.max(0)),
            clustering_row_count,
            next_partition: partition_offset,
            next_clustering_row: 0,
        }
    }

    /// The slice of `[partition_offset, partition_offset + partition_count)`
    /// owned by `worker_id`. The last worker also takes the remainder.
    pub fn for_worker(
        partition_offset: i64,
        partition_count: i64,
        clustering_row_count: i64,
        worker_id: usize,
        concurrency: usize,
    ) -> Self {
        let concurrency = concurrency.max(1) as i64;
        let worker_id = worker_id as i64;
        let per_worker = partition_count / concurrency;

        let start = partition_offset.saturating_add(worker_id * per_worker);
        let count = if worker_id == concurrency - 1 {
            partition_count - worker_id * per_worker
        } else {
            per_worker
        };
        Self::new(start, count, clustering_row_count)
    }
}

impl WorkloadGenerator for SequentialWorkload {
    fn is_done(&self) -> bool {
        self.next_partition >= self.partition_end
            || (self.next_partition + 1 == self.partition_end && self.is_partition_done())
    }

    fn is_partition_done(&self) -> bool {
        self.next_clustering_row >= self.clustering_row_count
    }

    fn next_partition_key(&mut self) -> i64 {
        if self.is_partition_done() {
            self.next_partition += 1;
            self.next_clustering_row = 0;
        }
        self.next_partition
    }

    fn next_clustering_key(&mut self) -> i64 {
        let ck = self.next_clustering_row;
        self.next_clustering_row += 1;
        ck
    }
}

/// Uniformly random keys until a time limit passes.
#[derive(Debug)]
pub struct UniformWorkload {
    rng: StdRng,
    partition_offset: i64,
    partition_count: i64,
    clustering_row_count: i64,
    start: Instant,
    duration: Option<Duration>,
}

impl UniformWorkload {
    /// A zero `duration` never finishes; the run then ends only when stopped.
    pub fn new(
        partition_offset: i64,
        partition_count: i64,
        clustering_row_count: i64,
        duration: Duration,
    ) -> Self {
        Self::with_rng(
            StdRng::from_entropy(),
            partition_offset,
            partition_count,
            clustering_row_count,
            duration,
        )
    }

    pub fn with_rng(
        rng: StdRng,
        partition_offset: i64,
        partition_count: i64,
        clustering_row_count: i64,
        duration: Duration,
    ) -> Self {
        Self {
            rng,
            partition_offset,
            partition_count: partition_count.max(1),
            clustering_row_count: clustering_row_count.max(1),
            start: Instant::now(),
            duration: (!duration.is_zero()).then_some(duration),
        }
    }
}

impl WorkloadGenerator for UniformWorkload {
    fn is_done(&self) -> bool {
        self.duration
            .is_some_and(|duration| self.start.elapsed() >= duration)
    }

    fn is_partition_done(&self) -> bool {
        false
    }

    fn next_partition_key(&mut self) -> i64 {
        self.partition_offset.saturating_add(self.rng.gen_range(0..self.partition_count))
    }

    fn next_clustering_key(&mut self) -> i64 {
        self.rng.gen_range(0..self.clustering_row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit_all(workload: &mut SequentialWorkload) -> Vec<(i64, i64)> {
        let mut keys = Vec::new();
        while !workload.is_done() {
            let pk = workload.next_partition_key();
            let ck = workload.next_clustering_key();
            keys.push((pk, ck));
        }
        keys
    }

    #[test]
    fn test_sequential_visits_every_row_once() {
        let mut workload = SequentialWorkload::new(10, 2, 3);
        assert_eq!(
            visit_all(&mut workload),
            vec![(10, 0), (10, 1), (10, 2), (11, 0), (11, 1), (11, 2)]
        );
    }

    #[test]
    fn test_sequential_partition_done() {
        let mut workload = SequentialWorkload::new(0, 2, 2);
        assert_eq!(workload.next_partition_key(), 0);
        workload.next_clustering_key();
        assert!(!workload.is_partition_done());
        workload.next_clustering_key();
        assert!(workload.is_partition_done());
        assert!(!workload.is_done());
        assert_eq!(workload.next_partition_key(), 1);
        assert!(!workload.is_partition_done());
    }

    #[test]
    fn test_sequential_empty_range_is_done() {
        assert!(SequentialWorkload::new(5, 0, 10).is_done());
    }

    #[test]
    fn test_sequential_split_across_workers() {
        let mut all = Vec::new();
        for worker in 0..3 {
            let mut workload = SequentialWorkload::for_worker(100, 10, 1, worker, 3);
            all.extend(visit_all(&mut workload).into_iter().map(|(pk, _)| pk));
        }
        all.sort();
        assert_eq!(all, (100..110).collect::<Vec<_>>());
    }

    #[test]
    fn test_sequential_range_ending_at_max_key() {
        let mut all = Vec::new();
        for worker in 0..2 {
            let mut workload = SequentialWorkload::for_worker(i64::MAX - 4, 4, 1, worker, 2);
            all.extend(visit_all(&mut workload).into_iter().map(|(pk, _)| pk));
        }
        assert_eq!(all, ((i64::MAX - 4)..i64::MAX).collect::<Vec<_>>());
    }

    #[test]
    fn test_uniform_keys_in_range() {
        let mut workload =
            UniformWorkload::with_rng(StdRng::seed_from_u64(7), 50, 10, 4, Duration::ZERO);
        for _ in 0..1000 {
            let pk = workload.next_partition_key();
            let ck = workload.next_clustering_key();
            assert!((50..60).contains(&pk));
            assert!((0..4).contains(&ck));
        }
        assert!(!workload.is_done());
        assert!(!workload.is_partition_done());
    }

    #[test]
    fn test_uniform_finishes_after_duration() {
        let workload = UniformWorkload::new(0, 10, 10, Duration::from_millis(20));
        assert!(!workload.is_done());
        std::thread::sleep(Duration::from_millis(30));
        assert!(workload.is_done());
    }
}
