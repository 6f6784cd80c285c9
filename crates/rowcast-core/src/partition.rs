//! Row partitioning of an `N × N` product over `P` ranks.
//!
//! `N / P` rows go to every rank and the `N mod P` leftover rows are
//! front-loaded onto ranks `0..N mod P`, one each. Ranges are contiguous and
//! ordered by rank, so the gather step can reassemble the result by rank
//! order alone. The tie-break is fixed: timings for different worker counts
//! are only comparable if the same counts always produce the same imbalance.

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::types::{RowRange, WorkerAssignment};

/// Whether a partition may leave ranks without rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPolicy {
    /// Accept `P > N`; ranks `N..P` then get empty ranges.
    #[serde(default)]
    pub allow_idle_workers: bool,
}

impl PartitionPolicy {
    /// Policy that accepts idle ranks.
    pub fn allow_idle() -> Self {
        Self {
            allow_idle_workers: true,
        }
    }
}

/// Partition `[0, n)` over `workers` ranks, rejecting idle ranks.
pub fn partition(n: usize, workers: usize) -> Result<WorkerAssignment, EngineError> {
    partition_with(n, workers, PartitionPolicy::default())
}

/// Partition `[0, n)` over `workers` ranks under `policy`.
pub fn partition_with(
    n: usize,
    workers: usize,
    policy: PartitionPolicy,
) -> Result<WorkerAssignment, EngineError> {
    if workers == 0 {
        return Err(EngineError::InvalidConfiguration(
            "worker count must be at least 1".into(),
        ));
    }
    if n == 0 {
        return Err(EngineError::InvalidConfiguration(
            "matrix size must be at least 1".into(),
        ));
    }
    if workers > n && !policy.allow_idle_workers {
        return Err(EngineError::InvalidConfiguration(format!(
            "{workers} workers for {n} rows would leave {} worker(s) without rows",
            workers - n
        )));
    }

    let base = n / workers;
    let remainder = n % workers;

    let mut start = 0;
    let ranges = (0..workers)
        .map(|rank| {
            let rows = if rank < remainder { base + 1 } else { base };
            let range = RowRange::new(start, start + rows);
            start += rows;
            range
        })
        .collect();

    Ok(WorkerAssignment { size: n, ranges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ten_rows_three_workers() {
        let assignment = partition(10, 3).unwrap();
        assert_eq!(
            assignment.ranges,
            vec![RowRange::new(0, 4), RowRange::new(4, 7), RowRange::new(7, 10)]
        );
    }

    #[test]
    fn test_single_worker_takes_everything() {
        let assignment = partition(7, 1).unwrap();
        assert_eq!(assignment.ranges, vec![RowRange::new(0, 7)]);
    }

    #[test]
    fn test_one_row_per_worker() {
        let assignment = partition(5, 5).unwrap();
        assert!(assignment.iter().all(|r| r.len() == 1));
        assert_eq!(assignment.imbalance(), 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            partition(10, 0),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_more_workers_than_rows_rejected_by_default() {
        assert!(matches!(
            partition(3, 4),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_idle_workers_allowed_by_policy() {
        let assignment = partition_with(3, 5, PartitionPolicy::allow_idle()).unwrap();
        let lens: Vec<usize> = assignment.iter().map(RowRange::len).collect();
        assert_eq!(lens, vec![1, 1, 1, 0, 0]);
        assert_eq!(assignment.range(4), Some(RowRange::new(3, 3)));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(partition(0, 1).is_err());
    }

    proptest! {
        #[test]
        fn prop_ranges_tile_rows_and_front_load(n in 1usize..500, p_seed in 0usize..500) {
            let p = 1 + p_seed % n;
            let assignment = partition(n, p).unwrap();

            prop_assert_eq!(assignment.workers(), p);
            prop_assert_eq!(assignment.ranges[0].start, 0);
            prop_assert_eq!(assignment.ranges[p - 1].end, n);
            for pair in assignment.ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }

            let remainder = n % p;
            for (rank, range) in assignment.iter().enumerate() {
                let expected = n / p + usize::from(rank < remainder);
                prop_assert_eq!(range.len(), expected);
            }
        }
    }
}
