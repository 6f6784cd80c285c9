//! CPU compute backend using Rayon for shared-memory parallelism inside a rank.

use std::sync::Arc;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::backend::{check_shapes, ComputeBackend, ComputeError, DeviceInfo};
use crate::element::Element;

/// How the rows of a block are spread over threads.
#[derive(Clone)]
enum Threading {
    /// One thread, rows in order.
    Sequential,
    /// Rayon's global pool.
    Global,
    /// A dedicated pool owned by this backend.
    Pool(Arc<rayon::ThreadPool>),
}

/// CPU backend that parallelises rows across threads via Rayon.
///
/// Each output row is produced by a single thread, so the per-element
/// summation order is the same regardless of the thread count.
#[derive(Clone)]
pub struct CpuBackend {
    threading: Threading,
    num_threads: usize,
}

impl CpuBackend {
    /// Create a new CPU backend using all threads of the global Rayon pool.
    pub fn new() -> Self {
        Self {
            threading: Threading::Global,
            num_threads: rayon::current_num_threads(),
        }
    }

    /// Create a single-threaded backend.
    ///
    /// This is the natural choice for one rank of a distributed run, where
    /// parallelism comes from the number of ranks.
    pub fn sequential() -> Self {
        Self {
            threading: Threading::Sequential,
            num_threads: 1,
        }
    }

    /// Create a CPU backend with a dedicated pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        match num_threads {
            0 => Err(ComputeError::Unavailable(
                "CPU backend needs at least one thread".into(),
            )),
            1 => Ok(Self::sequential()),
            n => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("rowcast-cpu-{i}"))
                    .build()
                    .map_err(|e| ComputeError::Unavailable(e.to_string()))?;
                Ok(Self {
                    threading: Threading::Pool(Arc::new(pool)),
                    num_threads: n,
                })
            }
        }
    }

    /// Number of threads this backend computes with.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> ComputeBackend<T> for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            compute_units: Some(self.num_threads),
        }
    }

    fn multiply_rows(
        &self,
        block: ArrayView2<'_, T>,
        rhs: ArrayView2<'_, T>,
    ) -> Result<Array2<T>, ComputeError> {
        check_shapes(&block, &rhs)?;

        let rows = block.nrows();
        let cols = rhs.ncols();

        let data: Vec<T> = match &self.threading {
            Threading::Sequential => (0..rows)
                .flat_map(|i| row_product(block.row(i), &rhs))
                .collect(),
            Threading::Global => parallel_rows(&block, &rhs),
            Threading::Pool(pool) => pool.install(|| parallel_rows(&block, &rhs)),
        };

        Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| ComputeError::DeviceError(e.to_string()))
    }
}

fn parallel_rows<T: Element>(block: &ArrayView2<'_, T>, rhs: &ArrayView2<'_, T>) -> Vec<T> {
    use rayon::prelude::*;

    (0..block.nrows())
        .into_par_iter()
        .flat_map_iter(|i| row_product(block.row(i), rhs))
        .collect()
}

/// One output row: `Σ_k a[k] · rhs[k, ..]`, accumulated over `k` in order.
fn row_product<T: Element>(a_row: ArrayView1<'_, T>, rhs: &ArrayView2<'_, T>) -> Vec<T> {
    let mut out = vec![T::zero(); rhs.ncols()];
    for (k, &a_ik) in a_row.iter().enumerate() {
        for (c, &b_kj) in out.iter_mut().zip(rhs.row(k).iter()) {
            *c += a_ik * b_kj;
        }
    }
    out
}
