//! Single-threaded reference multiply.

use rowcast_compute::Element;

use super::{square_dimension, EngineError, MultiplyEngine};
use crate::types::Matrix;

/// Triple-loop `A · B` on the calling thread.
///
/// The loop order is `i, k, j`: for each row of `C`, row `k` of `B` scaled by
/// `A[i, k]` is accumulated for `k = 0, 1, ..., N-1`. Each element therefore
/// sums its terms in ascending `k`, the same order the rank kernel uses.
pub fn multiply_serial<T: Element>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, EngineError> {
    let n = square_dimension(a, b)?;
    let mut c = Matrix::<T>::zeros((n, n));

    for (a_row, mut c_row) in a.rows().into_iter().zip(c.rows_mut()) {
        for (&a_ik, b_row) in a_row.iter().zip(b.rows()) {
            for (c_ij, &b_kj) in c_row.iter_mut().zip(b_row.iter()) {
                *c_ij += a_ik * b_kj;
            }
        }
    }

    Ok(c)
}

/// [`MultiplyEngine`] wrapper around [`multiply_serial`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialEngine;

impl SerialEngine {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Element> MultiplyEngine<T> for SerialEngine {
    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, EngineError> {
        multiply_serial(a, b)
    }

    fn worker_count(&self) -> usize {
        1
    }

    fn method_name(&self) -> &str {
        "serial"
    }
}
