//! Element-wise comparison of a distributed result against the serial
//! reference.
//!
//! A result passes when every element satisfies `|d - s| <= tolerance`.
//! Non-finite differences (for example a `NaN` in either operand) always
//! fail.

use rowcast_compute::Element;

use crate::engine::EngineError;
use crate::types::{Matrix, VerificationOutcome};

/// Largest element-wise difference between two matrices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// `max |d - s|`, `+inf` if any difference is not finite.
    pub max_abs_diff: f64,
    /// `(row, col)` of the largest difference; `None` for empty matrices.
    pub worst: Option<(usize, usize)>,
    /// Number of elements compared.
    pub elements: usize,
}

impl Comparison {
    /// Summarise this comparison as a verification outcome.
    pub fn outcome(&self, tolerance: f64) -> VerificationOutcome {
        VerificationOutcome {
            passed: self.max_abs_diff <= tolerance,
            tolerance,
            max_abs_error: Some(self.max_abs_diff).filter(|d| d.is_finite()),
            worst_element: self.worst.map(|(i, j)| [i, j]),
        }
    }
}

/// Scan both matrices and find the largest absolute difference.
pub fn compare<T: Element>(
    distributed: &Matrix<T>,
    serial: &Matrix<T>,
) -> Result<Comparison, EngineError> {
    if distributed.dim() != serial.dim() {
        let (dr, dc) = distributed.dim();
        let (sr, sc) = serial.dim();
        return Err(EngineError::InvalidConfiguration(format!(
            "cannot compare a {dr}x{dc} result with a {sr}x{sc} reference"
        )));
    }

    let mut max_abs_diff = 0.0f64;
    let mut worst = None;
    for ((idx, &d), &s) in distributed.indexed_iter().zip(serial.iter()) {
        let diff = (d.as_f64() - s.as_f64()).abs();
        let diff = if diff.is_finite() { diff } else { f64::INFINITY };
        if worst.is_none() || diff > max_abs_diff {
            max_abs_diff = diff;
            worst = Some(idx);
        }
    }

    Ok(Comparison {
        max_abs_diff,
        worst,
        elements: distributed.len(),
    })
}

/// Check `distributed` against `serial` and fail on the worst element if it
/// exceeds `tolerance`.
pub fn verify<T: Element>(
    distributed: &Matrix<T>,
    serial: &Matrix<T>,
    tolerance: f64,
) -> Result<Comparison, EngineError> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(EngineError::InvalidConfiguration(format!(
            "tolerance must be a non-negative finite number, got {tolerance}"
        )));
    }

    let comparison = compare(distributed, serial)?;
    if comparison.max_abs_diff > tolerance {
        let (row, col) = comparison.worst.unwrap_or((0, 0));
        return Err(EngineError::VerificationMismatch {
            row,
            col,
            distributed: distributed[[row, col]].as_f64(),
            serial: serial[[row, col]].as_f64(),
            difference: comparison.max_abs_diff,
            tolerance,
        });
    }
    Ok(comparison)
}

/// `true` when `distributed` matches `serial` within `tolerance`.
pub fn matches<T: Element>(distributed: &Matrix<T>, serial: &Matrix<T>, tolerance: f64) -> bool {
    verify(distributed, serial, tolerance).is_ok()
}
