//! Core types shared across the Rowcast engines and harness.
//!
//! This module defines the data that flows through a benchmark session:
//! matrices, row assignments, timed run records, their aggregates, and the
//! result bundle handed to reporting.

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::engine::Stage;
use crate::harness::BenchmarkConfig;

/// Dense, row-major, square matrix.
pub type Matrix<T> = Array2<T>;

/// Half-open interval `[start, end)` of row indices owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "row range start {start} after end {end}");
        Self { start, end }
    }

    /// Number of rows in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.start..self.end).contains(&row)
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Rank-ordered row ranges covering `[0, N)` without gaps or overlaps.
///
/// Index `r` holds the range of rank `r`. Because the ranges are contiguous
/// and ordered, concatenating per-rank results in rank order rebuilds the
/// full result without any row-index bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    /// Matrix dimension N.
    pub size: usize,
    /// Per-rank ranges.
    pub ranges: Vec<RowRange>,
}

impl WorkerAssignment {
    /// Number of ranks (P).
    pub fn workers(&self) -> usize {
        self.ranges.len()
    }

    /// Range assigned to `rank`, if the rank exists.
    pub fn range(&self, rank: usize) -> Option<RowRange> {
        self.ranges.get(rank).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowRange> {
        self.ranges.iter()
    }

    /// Row count of the busiest rank minus that of the least busy one.
    pub fn imbalance(&self) -> usize {
        let max = self.ranges.iter().map(RowRange::len).max().unwrap_or(0);
        let min = self.ranges.iter().map(RowRange::len).min().unwrap_or(0);
        max - min
    }
}

/// Which engine produced a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Serial,
    Distributed,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Serial => write!(f, "serial"),
            EngineKind::Distributed => write!(f, "distributed"),
        }
    }
}

/// Grouping key for aggregates: one engine at one (N, P) configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatKey {
    pub engine: EngineKind,
    pub size: usize,
    pub workers: usize,
}

/// One timed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub engine: EngineKind,
    /// Matrix dimension N.
    pub size: usize,
    /// Worker count P (1 for the serial engine).
    pub workers: usize,
    /// Wall-clock time of the multiply call (seconds).
    pub elapsed_secs: f64,
    /// Zero-based index of the run within its configuration.
    pub iteration: usize,
}

impl RunRecord {
    pub fn key(&self) -> StatKey {
        StatKey {
            engine: self.engine,
            size: self.size,
            workers: self.workers,
        }
    }
}

/// Result of checking one distributed configuration against the serial
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub passed: bool,
    pub tolerance: f64,
    /// Largest element-wise absolute difference observed; `None` when some
    /// difference was not finite (a `NaN` or infinity in the result).
    pub max_abs_error: Option<f64>,
    /// `[row, col]` of that difference.
    pub worst_element: Option<[usize; 2]>,
}

/// Statistics over all runs sharing a [`StatKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    pub engine: EngineKind,
    pub size: usize,
    pub workers: usize,
    /// Number of runs aggregated.
    pub runs: usize,
    pub mean_secs: f64,
    /// Population standard deviation.
    pub std_dev_secs: f64,
    pub min_secs: f64,
    pub max_secs: f64,
    /// Present when verification was requested for this configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationOutcome>,
}

impl AggregateStat {
    pub fn key(&self) -> StatKey {
        StatKey {
            engine: self.engine,
            size: self.size,
            workers: self.workers,
        }
    }

    /// Standard deviation relative to the mean.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        (self.mean_secs > 0.0).then(|| self.std_dev_secs / self.mean_secs)
    }

    /// `Some(passed)` when verification ran for this configuration.
    pub fn verification_passed(&self) -> Option<bool> {
        self.verification.as_ref().map(|v| v.passed)
    }
}

/// A configuration that was skipped after a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFailure {
    pub size: usize,
    pub workers: usize,
    /// Protocol stage that failed, when the failure came from the protocol.
    pub stage: Option<Stage>,
    pub message: String,
}

/// Complete output of a benchmark session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Configuration that produced the results.
    pub config: BenchmarkConfig,
    /// Element width the session ran at (`"f32"` or `"f64"`).
    pub element: String,
    /// Serial baselines, one per size, in configuration order.
    pub serial: Vec<AggregateStat>,
    /// Distributed results, one per completed (size, workers) pair, in
    /// configuration order.
    pub distributed: Vec<AggregateStat>,
    /// Every individual run behind the aggregates.
    pub records: Vec<RunRecord>,
    /// Configurations skipped after a failure.
    #[serde(default)]
    pub failures: Vec<ConfigFailure>,
}

impl ResultBundle {
    /// Serial baseline for `size`.
    pub fn serial_for(&self, size: usize) -> Option<&AggregateStat> {
        self.serial.iter().find(|s| s.size == size)
    }

    /// Distributed result for `(size, workers)`.
    pub fn distributed_for(&self, size: usize, workers: usize) -> Option<&AggregateStat> {
        self.distributed
            .iter()
            .find(|s| s.size == size && s.workers == workers)
    }

    /// Records behind one aggregate.
    pub fn records_for(&self, key: StatKey) -> impl Iterator<Item = &RunRecord> {
        self.records.iter().filter(move |r| r.key() == key)
    }

    /// `true` when every configuration completed and no verification failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && self
                .distributed
                .iter()
                .all(|s| s.verification_passed() != Some(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_range_len_and_display() {
        let r = RowRange::new(4, 7);
        assert_eq!(r.len(), 3);
        assert!(!r.is_empty());
        assert!(r.contains(4) && r.contains(6) && !r.contains(7));
        assert_eq!(r.to_string(), "[4, 7)");
        assert!(RowRange::new(3, 3).is_empty());
    }

    #[test]
    fn test_assignment_imbalance() {
        let assignment = WorkerAssignment {
            size: 10,
            ranges: vec![RowRange::new(0, 4), RowRange::new(4, 7), RowRange::new(7, 10)],
        };
        assert_eq!(assignment.workers(), 3);
        assert_eq!(assignment.imbalance(), 1);
        assert_eq!(assignment.range(1), Some(RowRange::new(4, 7)));
        assert_eq!(assignment.range(3), None);
    }

    #[test]
    fn test_coefficient_of_variation() {
        let stat = AggregateStat {
            engine: EngineKind::Serial,
            size: 10,
            workers: 1,
            runs: 3,
            mean_secs: 2.0,
            std_dev_secs: 0.1,
            min_secs: 1.9,
            max_secs: 2.1,
            verification: None,
        };
        assert_eq!(stat.coefficient_of_variation(), Some(0.05));
        assert_eq!(stat.verification_passed(), None);
    }
}
