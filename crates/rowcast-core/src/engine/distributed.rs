//! Row-partitioned multiply over an in-process group of ranks.
//!
//! Each multiply wires up a fresh [`LocalGroup`] of `P` ranks, runs
//! [`execute_rank`] on one scoped thread per rank and returns the product
//! assembled at the coordinator. Nothing survives between calls.
//!
//! A rank that panics is reported as a [`Stage::Compute`] failure whatever
//! it was doing at the time; the reason text says so and carries the panic
//! message.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rowcast_compute::{
    Communicator, ComputeBackend, CpuBackend, Element, LocalGroup, TrafficSnapshot,
};

use super::protocol::{execute_rank, COORDINATOR};
use super::{square_dimension, EngineError, MultiplyEngine, Stage};
use crate::partition::{partition_with, PartitionPolicy};
use crate::types::Matrix;

/// Distributed `A · B` with a fixed number of ranks.
pub struct DistributedEngine<T: Element> {
    workers: usize,
    backend: Arc<dyn ComputeBackend<T>>,
    policy: PartitionPolicy,
    timeout: Option<Duration>,
}

impl<T: Element> DistributedEngine<T> {
    /// Engine with `workers` ranks, each computing its block on its own
    /// thread only.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            backend: Arc::new(CpuBackend::sequential()),
            policy: PartitionPolicy::default(),
            timeout: None,
        }
    }

    /// Use `backend` for every rank's local block.
    pub fn with_backend(mut self, backend: Arc<dyn ComputeBackend<T>>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_policy(mut self, policy: PartitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fail a rank that waits longer than `timeout` on any single message.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of ranks (P).
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Multiply and also report the traffic the protocol generated.
    pub fn multiply_with_traffic(
        &self,
        a: &Matrix<T>,
        b: &Matrix<T>,
    ) -> Result<(Matrix<T>, TrafficSnapshot), EngineError> {
        // Reject bad inputs before any rank exists.
        let n = square_dimension(a, b)?;
        partition_with(n, self.workers, self.policy)?;

        let group = LocalGroup::<T>::new(self.workers)
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?
            .with_timeout(self.timeout);
        let traffic = group.traffic();
        let endpoints = group.into_endpoints();

        let outcomes: Vec<Result<Option<Matrix<T>>, EngineError>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(endpoints.len());
            for endpoint in endpoints {
                let rank = endpoint.rank();
                let inputs = (rank == COORDINATOR).then_some((a, b));
                let backend = self.backend.as_ref();
                let policy = self.policy;
                let spawned = thread::Builder::new()
                    .name(format!("rowcast-rank-{rank}"))
                    .spawn_scoped(scope, move || {
                        execute_rank(&endpoint, inputs, backend, policy)
                    });
                handles.push((rank, spawned));
            }

            handles
                .into_iter()
                .map(|(rank, spawned)| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|payload| {
                        Err(EngineError::DistributedComputeFailure {
                            stage: Stage::Compute,
                            rank,
                            reason: format!(
                                "rank panicked at an unknown stage: {}",
                                panic_message(payload.as_ref())
                            ),
                        })
                    }),
                    Err(e) => Err(EngineError::DistributedComputeFailure {
                        stage: Stage::Launch,
                        rank,
                        reason: e.to_string(),
                    }),
                })
                .collect()
        });

        let traffic = traffic.snapshot();
        log::debug!(
            "N={} P={}: {} messages, {} elements",
            n,
            self.workers,
            traffic.messages,
            traffic.elements
        );

        let mut result = None;
        let mut first_error: Option<EngineError> = None;
        for outcome in outcomes {
            match outcome {
                Ok(Some(c)) => result = Some(c),
                Ok(None) => {}
                Err(e) => {
                    log::debug!("rank failure: {e}");
                    let replace = match &first_error {
                        None => true,
                        Some(current) => failure_stage(&e) < failure_stage(current),
                    };
                    if replace {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        let c = result.ok_or_else(|| EngineError::DistributedComputeFailure {
            stage: Stage::Gather,
            rank: COORDINATOR,
            reason: "coordinator returned no result".into(),
        })?;
        Ok((c, traffic))
    }
}

/// Stage used to rank failures; errors raised outside the protocol sort
/// first.
fn failure_stage(e: &EngineError) -> Stage {
    e.stage().unwrap_or(Stage::Launch)
}

impl<T: Element> MultiplyEngine<T> for DistributedEngine<T> {
    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, EngineError> {
        self.multiply_with_traffic(a, b).map(|(c, _)| c)
    }

    fn worker_count(&self) -> usize {
        self.workers
    }

    fn method_name(&self) -> &str {
        "row-partitioned"
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "no message"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::serial::multiply_serial;
    use crate::matrix::MatrixPair;

    #[test]
    fn test_matches_serial_bit_for_bit() {
        let pair = MatrixPair::<f64>::seeded(23, 42);
        let expected = multiply_serial(&pair.a, &pair.b).unwrap();
        for workers in [1, 2, 3, 7, 23] {
            let c = DistributedEngine::new(workers).multiply(&pair.a, &pair.b).unwrap();
            assert_eq!(c, expected, "P={workers}");
        }
    }

    #[test]
    fn test_traffic_volume() {
        let n = 10usize;
        let pair = MatrixPair::<f64>::seeded(n, 5);
        let (_, traffic) = DistributedEngine::new(3)
            .multiply_with_traffic(&pair.a, &pair.b)
            .unwrap();

        // Broadcast to 2 peers, scatter to 2 peers, gather from 2 peers.
        assert_eq!(traffic.messages, 6);
        // B twice, then rows 4..10 out and back.
        let rows_off_coordinator = (n - 4) as u64;
        assert_eq!(
            traffic.elements,
            2 * (n * n) as u64 + 2 * rows_off_coordinator * n as u64
        );
    }

    #[test]
    fn test_too_many_workers_rejected_before_launch() {
        let pair = MatrixPair::<f64>::seeded(3, 1);
        let err = DistributedEngine::new(4)
            .multiply(&pair.a, &pair.b)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_idle_workers_still_produce_full_result() {
        let pair = MatrixPair::<f64>::seeded(3, 1);
        let c = DistributedEngine::new(5)
            .with_policy(PartitionPolicy::allow_idle())
            .multiply(&pair.a, &pair.b)
            .unwrap();
        assert_eq!(c, multiply_serial(&pair.a, &pair.b).unwrap());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let pair = MatrixPair::<f64>::seeded(3, 1);
        assert!(DistributedEngine::new(0).multiply(&pair.a, &pair.b).is_err());
    }
}
