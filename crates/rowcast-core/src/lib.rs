//! # Rowcast Core
//!
//! Row-partitioned dense matrix multiplication over message passing, with a
//! serial reference, a correctness verifier and a benchmark harness.
//!
//! ## Architecture
//!
//! Both engines implement the [`engine::MultiplyEngine`] trait. The serial
//! engine ([`engine::serial::SerialEngine`]) is the baseline every speedup is
//! measured against. The distributed engine
//! ([`engine::distributed::DistributedEngine`]) partitions the rows of `A`
//! over `P` ranks, broadcasts `B`, scatters the row slices, lets each rank
//! compute its block and gathers the blocks back at rank 0.
//!
//! ## Modules
//!
//! - [`types`]: matrices, row assignments, run records and aggregates.
//! - [`partition`]: contiguous row ranges with front-loaded remainder.
//! - [`matrix`]: seeded input generation.
//! - [`engine`]: the engine trait, serial reference and distributed protocol.
//! - [`verify`]: element-wise comparison against the serial reference.
//! - [`stats`]: mean, standard deviation and coefficient of variation.
//! - [`harness`]: benchmark sessions and their run log.
//! - [`analysis`]: speedup, efficiency and scaling assessment.

pub mod analysis;
pub mod engine;
pub mod harness;
pub mod matrix;
pub mod partition;
pub mod stats;
pub mod types;
pub mod verify;

pub use engine::distributed::DistributedEngine;
pub use engine::serial::{multiply_serial, SerialEngine};
pub use engine::{EngineError, MultiplyEngine, Stage};
pub use harness::{BenchmarkConfig, BenchmarkSession, FailurePolicy, InputPolicy};
pub use matrix::MatrixPair;
pub use partition::{partition, partition_with, PartitionPolicy};
pub use types::{
    AggregateStat, ConfigFailure, EngineKind, Matrix, ResultBundle, RowRange, RunRecord,
    StatKey, VerificationOutcome, WorkerAssignment,
};
