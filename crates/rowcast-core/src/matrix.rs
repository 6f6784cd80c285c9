//! Seeded input generation.
//!
//! Values are uniform in `[0, 1)`, drawn from a ChaCha stream so that the
//! same seed gives the same matrices on every platform. `A` is drawn first
//! and `B` continues the same stream.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use rowcast_compute::Element;

use crate::types::Matrix;

/// Fill an `n × n` matrix from `rng`, row by row.
pub fn random_matrix<T: Element, R: Rng + ?Sized>(n: usize, rng: &mut R) -> Matrix<T> {
    Matrix::from_shape_simple_fn((n, n), || T::from_f64(rng.gen::<f64>()))
}

/// The two operands of one multiply.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixPair<T> {
    pub a: Matrix<T>,
    pub b: Matrix<T>,
}

impl<T: Element> MatrixPair<T> {
    /// Generate `A` and `B` of dimension `n` from `seed`.
    pub fn seeded(n: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(n, &mut rng);
        let b = random_matrix(n, &mut rng);
        Self { a, b }
    }

    /// Dimension N.
    pub fn size(&self) -> usize {
        self.a.nrows()
    }
}
