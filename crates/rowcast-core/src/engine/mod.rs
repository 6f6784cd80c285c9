//! Multiply engines.
//!
//! The [`MultiplyEngine`] trait is the interface the benchmark harness times.
//! [`serial::SerialEngine`] is the single-threaded reference;
//! [`distributed::DistributedEngine`] runs the row-partitioned protocol in
//! [`protocol`] over an in-process group of ranks.

pub mod distributed;
pub mod protocol;
pub mod serial;

use std::fmt;

use rowcast_compute::Element;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Matrix;

/// Phase of the distributed protocol, in execution order.
///
/// The ordering is used to pick which failure to report when several ranks
/// fail at once: the earliest stage wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Launch,
    Broadcast,
    Scatter,
    Compute,
    Gather,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Launch => "launch",
            Stage::Broadcast => "broadcast",
            Stage::Scatter => "scatter",
            Stage::Compute => "compute",
            Stage::Gather => "gather",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while multiplying, verifying or benchmarking.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Distributed compute failed at {stage} on rank {rank}: {reason}")]
    DistributedComputeFailure {
        stage: Stage,
        rank: usize,
        reason: String,
    },

    #[error(
        "Verification failed at ({row}, {col}): distributed {distributed:e}, serial {serial:e}, \
         difference {difference:.3e} exceeds tolerance {tolerance:.1e}"
    )]
    VerificationMismatch {
        row: usize,
        col: usize,
        distributed: f64,
        serial: f64,
        difference: f64,
        tolerance: f64,
    },

    #[error("Benchmark aborted at N={size}, P={workers}: {source}")]
    BenchmarkAborted {
        size: usize,
        workers: usize,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Protocol stage behind this error, looking through aborts.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EngineError::DistributedComputeFailure { stage, .. } => Some(*stage),
            EngineError::BenchmarkAborted { source, .. } => source.stage(),
            _ => None,
        }
    }
}

/// An implementation of `C = A · B` for square matrices.
///
/// Implementations must not modify their inputs and must return a freshly
/// allocated `N × N` result. Both engines in this crate accumulate each
/// element over `k` in ascending order, so their results are bit-identical.
pub trait MultiplyEngine<T: Element>: Send + Sync {
    /// Compute `a · b`.
    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, EngineError>;

    /// Number of ranks participating (1 for serial execution).
    fn worker_count(&self) -> usize;

    /// Human-readable name of the engine.
    fn method_name(&self) -> &str;
}

/// Check that `a` and `b` are non-empty square matrices of the same size
/// and return that size.
pub fn square_dimension<T>(a: &Matrix<T>, b: &Matrix<T>) -> Result<usize, EngineError> {
    let (ar, ac) = a.dim();
    let (br, bc) = b.dim();
    if ar != ac || br != bc {
        return Err(EngineError::InvalidConfiguration(format!(
            "operands must be square, got {ar}x{ac} and {br}x{bc}"
        )));
    }
    if ar != br {
        return Err(EngineError::InvalidConfiguration(format!(
            "operand sizes differ: {ar} and {br}"
        )));
    }
    if ar == 0 {
        return Err(EngineError::InvalidConfiguration(
            "matrix size must be at least 1".into(),
        ));
    }
    Ok(ar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Launch < Stage::Broadcast);
        assert!(Stage::Broadcast < Stage::Scatter);
        assert!(Stage::Scatter < Stage::Compute);
        assert!(Stage::Compute < Stage::Gather);
    }

    #[test]
    fn test_square_dimension() {
        let a = Matrix::<f64>::zeros((3, 3));
        assert_eq!(square_dimension(&a, &a).unwrap(), 3);

        let rect = Matrix::<f64>::zeros((3, 2));
        assert!(square_dimension(&rect, &a).is_err());

        let other = Matrix::<f64>::zeros((4, 4));
        assert!(square_dimension(&a, &other).is_err());

        let empty = Matrix::<f64>::zeros((0, 0));
        assert!(square_dimension(&empty, &empty).is_err());
    }

    #[test]
    fn test_abort_exposes_inner_stage() {
        let err = EngineError::BenchmarkAborted {
            size: 10,
            workers: 2,
            source: Box::new(EngineError::DistributedComputeFailure {
                stage: Stage::Scatter,
                rank: 1,
                reason: "gone".into(),
            }),
        };
        assert_eq!(err.stage(), Some(Stage::Scatter));
        assert!(err.to_string().contains("N=10, P=2"));
    }
}
