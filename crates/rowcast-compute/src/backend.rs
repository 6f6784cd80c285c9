//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over how a rank executes its local
//! block of the product, so that the partitioning and message-passing code in
//! `rowcast-core` stays independent of threading decisions inside a rank.

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

use crate::element::Element;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Shape mismatch: left block is {left_rows}x{left_cols}, right matrix is {right_rows}x{right_cols}")]
    ShapeMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("Device error: {0}")]
    DeviceError(String),
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub compute_units: Option<usize>,
}

/// Abstraction over local compute backends.
///
/// Every rank of a distributed multiply calls [`multiply_rows`] exactly once
/// on its slice of `A`. Implementations must accumulate each output element
/// over `k` in ascending order; the serial reference does the same, which is
/// what makes distributed and serial results agree bit for bit.
///
/// [`multiply_rows`]: ComputeBackend::multiply_rows
pub trait ComputeBackend<T: Element>: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Compute the dense product of a row block `rows × K` with `K × N`.
    ///
    /// A block with zero rows is valid and yields a `0 × N` result.
    fn multiply_rows(
        &self,
        block: ArrayView2<'_, T>,
        rhs: ArrayView2<'_, T>,
    ) -> Result<Array2<T>, ComputeError>;
}

/// Check that `block × rhs` is defined.
pub(crate) fn check_shapes<T>(
    block: &ArrayView2<'_, T>,
    rhs: &ArrayView2<'_, T>,
) -> Result<(), ComputeError> {
    if block.ncols() != rhs.nrows() {
        return Err(ComputeError::ShapeMismatch {
            left_rows: block.nrows(),
            left_cols: block.ncols(),
            right_rows: rhs.nrows(),
            right_cols: rhs.ncols(),
        });
    }
    Ok(())
}
