//! Integration tests for the distributed multiply.
//!
//! - Agreement with the serial reference for every worker count
//! - Seeded N=100, P=4 scenario
//! - Repeatability (bit-identical runs)
//! - Failure reporting: failing rank, panicking rank, receive timeout
//! - Traffic volume of the broadcast/scatter/gather protocol

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use ndarray::{Array2, ArrayView2};

use rowcast_compute::{ComputeBackend, ComputeError, CpuBackend, DeviceInfo};
use rowcast_core::verify::{compare, verify};
use rowcast_core::{
    multiply_serial, partition, DistributedEngine, EngineError, MatrixPair, MultiplyEngine,
    PartitionPolicy, Stage,
};

// ─────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────

fn current_rank() -> Option<usize> {
    thread::current()
        .name()?
        .strip_prefix("rowcast-rank-")?
        .parse()
        .ok()
}

/// Behaves like the CPU backend except on one rank.
struct FaultyBackend {
    rank: usize,
    fault: Fault,
}

enum Fault {
    Error,
    Panic,
    Stall(Duration),
}

impl ComputeBackend<f64> for FaultyBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "faulty".into(),
            compute_units: Some(1),
        }
    }

    fn multiply_rows(
        &self,
        block: ArrayView2<'_, f64>,
        rhs: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, ComputeError> {
        if current_rank() == Some(self.rank) {
            match self.fault {
                Fault::Error => return Err(ComputeError::DeviceError("injected fault".into())),
                Fault::Panic => panic!("injected panic"),
                Fault::Stall(d) => thread::sleep(d),
            }
        }
        CpuBackend::sequential().multiply_rows(block, rhs)
    }
}

/// CPU backend that counts how many blocks it was asked to multiply.
#[derive(Default)]
struct CountingBackend {
    calls: AtomicUsize,
}

impl ComputeBackend<f64> for CountingBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "counting".into(),
            compute_units: Some(1),
        }
    }

    fn multiply_rows(
        &self,
        block: ArrayView2<'_, f64>,
        rhs: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        CpuBackend::sequential().multiply_rows(block, rhs)
    }
}

fn faulty(workers: usize, rank: usize, fault: Fault) -> DistributedEngine<f64> {
    DistributedEngine::new(workers).with_backend(Arc::new(FaultyBackend { rank, fault }))
}

// ─────────────────────────────────────────────────────────────
// Correctness
// ─────────────────────────────────────────────────────────────

#[test]
fn test_every_worker_count_matches_serial() {
    let n = 12;
    let pair = MatrixPair::<f64>::seeded(n, 42);
    let expected = multiply_serial(&pair.a, &pair.b).unwrap();

    for workers in 1..=n {
        let c = DistributedEngine::new(workers).multiply(&pair.a, &pair.b).unwrap();
        assert_eq!(c.dim(), (n, n));
        let cmp = compare(&c, &expected).unwrap();
        assert_eq!(cmp.max_abs_diff, 0.0, "P={workers}");
    }
}

#[test]
fn test_seeded_hundred_by_four() {
    let pair = MatrixPair::<f64>::seeded(100, 42);
    let serial = multiply_serial(&pair.a, &pair.b).unwrap();
    let distributed = DistributedEngine::new(4).multiply(&pair.a, &pair.b).unwrap();

    verify(&distributed, &serial, 1e-9).unwrap();

    // Entries are sums of 100 products of values in [0, 1).
    assert!(distributed.iter().all(|&x| (0.0..100.0).contains(&x)));
    assert_abs_diff_eq!(distributed.sum(), serial.sum(), epsilon = 1e-6);
}

#[test]
fn test_repeated_runs_are_bit_identical() {
    let pair = MatrixPair::<f64>::seeded(31, 7);
    let engine = DistributedEngine::new(5);
    let first = engine.multiply(&pair.a, &pair.b).unwrap();
    for _ in 0..3 {
        assert_eq!(engine.multiply(&pair.a, &pair.b).unwrap(), first);
    }
}

#[test]
fn test_single_worker_and_one_row_each() {
    let n = 9;
    let pair = MatrixPair::<f64>::seeded(n, 3);
    let expected = multiply_serial(&pair.a, &pair.b).unwrap();

    assert_eq!(DistributedEngine::new(1).multiply(&pair.a, &pair.b).unwrap(), expected);
    assert_eq!(DistributedEngine::new(n).multiply(&pair.a, &pair.b).unwrap(), expected);
}

#[test]
fn test_threaded_ranks_match_serial() {
    let pair = MatrixPair::<f64>::seeded(40, 11);
    let backend = Arc::new(CpuBackend::with_threads(2).unwrap());
    let c = DistributedEngine::new(3)
        .with_backend(backend)
        .multiply(&pair.a, &pair.b)
        .unwrap();
    assert_eq!(c, multiply_serial(&pair.a, &pair.b).unwrap());
}

#[test]
fn test_f32_path_verifies() {
    let pair = MatrixPair::<f32>::seeded(64, 42);
    let serial = multiply_serial(&pair.a, &pair.b).unwrap();
    let distributed = DistributedEngine::new(4).multiply(&pair.a, &pair.b).unwrap();
    verify(&distributed, &serial, 1e-4).unwrap();
}

#[test]
fn test_inputs_left_untouched() {
    let pair = MatrixPair::<f64>::seeded(10, 1);
    let before = pair.clone();
    DistributedEngine::new(3).multiply(&pair.a, &pair.b).unwrap();
    assert_eq!(pair, before);
}

// ─────────────────────────────────────────────────────────────
// Invalid configurations
// ─────────────────────────────────────────────────────────────

#[test]
fn test_ten_rows_over_three_workers() {
    let ranges: Vec<(usize, usize)> = partition(10, 3)
        .unwrap()
        .iter()
        .map(|r| (r.start, r.end))
        .collect();
    assert_eq!(ranges, vec![(0, 4), (4, 7), (7, 10)]);
}

#[test]
fn test_bad_worker_counts_rejected_before_any_rank_runs() {
    let pair = MatrixPair::<f64>::seeded(4, 1);
    let backend = Arc::new(CountingBackend::default());
    for (workers, expected) in [(0, "at least 1"), (5, "without rows")] {
        let err = DistributedEngine::<f64>::new(workers)
            .with_backend(backend.clone())
            .multiply_with_traffic(&pair.a, &pair.b)
            .unwrap_err();
        match &err {
            EngineError::InvalidConfiguration(msg) => {
                assert!(msg.contains(expected), "P={workers}: {msg}")
            }
            other => panic!("P={workers}: unexpected error: {other}"),
        }
        assert_eq!(err.stage(), None);
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    // The same backend is reached once per rank for a valid count.
    DistributedEngine::<f64>::new(2)
        .with_backend(backend.clone())
        .multiply(&pair.a, &pair.b)
        .unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_mismatched_operands_rejected() {
    let a = Array2::<f64>::zeros((4, 4));
    let b = Array2::<f64>::zeros((5, 5));
    assert!(matches!(
        DistributedEngine::new(2).multiply(&a, &b),
        Err(EngineError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_idle_workers_when_allowed() {
    let pair = MatrixPair::<f64>::seeded(2, 8);
    let c = DistributedEngine::new(4)
        .with_policy(PartitionPolicy::allow_idle())
        .multiply(&pair.a, &pair.b)
        .unwrap();
    assert_eq!(c, multiply_serial(&pair.a, &pair.b).unwrap());
}

// ─────────────────────────────────────────────────────────────
// Failures
// ─────────────────────────────────────────────────────────────

#[test]
fn test_failing_rank_reported_at_compute() {
    let pair = MatrixPair::<f64>::seeded(12, 2);
    let err = faulty(4, 2, Fault::Error)
        .multiply(&pair.a, &pair.b)
        .unwrap_err();
    match err {
        EngineError::DistributedComputeFailure { stage, rank, reason } => {
            assert_eq!(stage, Stage::Compute);
            assert_eq!(rank, 2);
            assert!(reason.contains("injected fault"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failing_coordinator_reported_at_compute() {
    let pair = MatrixPair::<f64>::seeded(12, 2);
    let err = faulty(3, 0, Fault::Error)
        .multiply(&pair.a, &pair.b)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Compute));
}

#[test]
fn test_panicking_rank_is_a_compute_failure() {
    let pair = MatrixPair::<f64>::seeded(12, 2);
    let err = faulty(3, 1, Fault::Panic)
        .multiply(&pair.a, &pair.b)
        .unwrap_err();
    match err {
        EngineError::DistributedComputeFailure {
            stage,
            rank,
            reason,
        } => {
            assert_eq!(stage, Stage::Compute);
            assert_eq!(rank, 1);
            assert!(reason.contains("unknown stage"), "{reason}");
            assert!(reason.contains("injected panic"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_stalled_rank_times_out_at_gather() {
    let pair = MatrixPair::<f64>::seeded(12, 2);
    let err = faulty(3, 1, Fault::Stall(Duration::from_millis(400)))
        .with_timeout(Some(Duration::from_millis(50)))
        .multiply(&pair.a, &pair.b)
        .unwrap_err();
    match err {
        EngineError::DistributedComputeFailure { stage, rank, reason } => {
            assert_eq!(stage, Stage::Gather);
            assert_eq!(rank, 0);
            assert!(reason.contains("Timed out"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ─────────────────────────────────────────────────────────────
// Traffic
// ─────────────────────────────────────────────────────────────

#[test]
fn test_traffic_matches_protocol_volume() {
    for (n, workers) in [(10usize, 1usize), (10, 3), (17, 4), (8, 8)] {
        let pair = MatrixPair::<f64>::seeded(n, 1);
        let (_, traffic) = DistributedEngine::new(workers)
            .multiply_with_traffic(&pair.a, &pair.b)
            .unwrap();

        let rows_on_coordinator = partition(n, workers).unwrap().ranges[0].len();
        let peers = (workers - 1) as u64;
        let n = n as u64;
        let expected_elements =
            peers * n * n + 2 * (n - rows_on_coordinator as u64) * n;

        assert_eq!(traffic.messages, 3 * peers, "N={n} P={workers}");
        assert_eq!(traffic.elements, expected_elements, "N={n} P={workers}");
    }
}
