//! Benchmark session configuration.

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::partition::PartitionPolicy;

/// How input matrices are chosen across the runs of one size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPolicy {
    /// One pair per size, generated from the session seed and reused by
    /// every run and every engine.
    #[default]
    Fixed,
    /// A fresh pair for run `i`, generated from `seed + i`. Every engine
    /// still sees the same pair for the same `i`.
    PerRun,
}

/// What a failed configuration does to the rest of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the session and return the failure.
    #[default]
    Abort,
    /// Record the failure and continue with the next configuration.
    Skip,
}

/// Everything a benchmark session needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Matrix dimensions to benchmark, in order.
    pub sizes: Vec<usize>,
    /// Worker counts for the distributed engine, in order.
    pub worker_counts: Vec<usize>,
    /// Timed runs per configuration.
    pub runs: usize,
    /// Untimed runs before the timed ones, per configuration.
    pub warmup_runs: usize,
    /// Seed for input generation.
    pub seed: u64,
    pub inputs: InputPolicy,
    /// Compare each distributed configuration against the serial reference.
    pub verify: bool,
    /// Absolute tolerance for verification; the element default when `None`.
    pub tolerance: Option<f64>,
    pub on_failure: FailurePolicy,
    pub partition: PartitionPolicy,
}

impl BenchmarkConfig {
    /// Config with the default seed (42), fixed inputs, verification on and
    /// abort-on-failure.
    pub fn new(sizes: Vec<usize>, worker_counts: Vec<usize>, runs: usize) -> Self {
        Self {
            sizes,
            worker_counts,
            runs,
            warmup_runs: 0,
            seed: 42,
            inputs: InputPolicy::Fixed,
            verify: true,
            tolerance: None,
            on_failure: FailurePolicy::Abort,
            partition: PartitionPolicy::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_warmup(mut self, warmup_runs: usize) -> Self {
        self.warmup_runs = warmup_runs;
        self
    }

    pub fn with_inputs(mut self, inputs: InputPolicy) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_verification(mut self, verify: bool, tolerance: Option<f64>) -> Self {
        self.verify = verify;
        self.tolerance = tolerance;
        self
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn with_partition(mut self, partition: PartitionPolicy) -> Self {
        self.partition = partition;
        self
    }

    /// Reject configurations that cannot produce a single measurement.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::InvalidConfiguration(msg));

        if self.sizes.is_empty() {
            return invalid("no matrix sizes given".into());
        }
        if self.worker_counts.is_empty() {
            return invalid("no worker counts given".into());
        }
        if self.runs == 0 {
            return invalid("runs must be at least 1".into());
        }
        if let Some(&size) = self.sizes.iter().find(|&&n| n == 0) {
            return invalid(format!("matrix size {size} must be at least 1"));
        }
        if self.worker_counts.contains(&0) {
            return invalid("worker counts must be at least 1".into());
        }
        // Pairs with more workers than rows are skipped per size; a count
        // that fits no size at all is a configuration error.
        if !self.partition.allow_idle_workers {
            let largest = self.sizes.iter().copied().max().unwrap_or(0);
            if let Some(&p) = self.worker_counts.iter().find(|&&p| p > largest) {
                return invalid(format!(
                    "{p} workers exceed every matrix size (largest {largest}); \
                     allow idle workers or drop that count"
                ));
            }
        }
        if let Some(tol) = self.tolerance {
            if !tol.is_finite() || tol < 0.0 {
                return invalid(format!(
                    "tolerance must be a non-negative finite number, got {tol}"
                ));
            }
        }
        Ok(())
    }
}
