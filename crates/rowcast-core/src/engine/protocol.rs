//! The row-partitioned multiply protocol, as run by one rank.
//!
//! Every rank runs [`execute_rank`] with its own communicator. Rank 0 (the
//! coordinator) owns the inputs and receives the result; it also computes
//! its own block like any other rank. The steps are:
//!
//! 1. the coordinator validates the operands and partitions the rows,
//! 2. `B` is broadcast to every rank,
//! 3. each rank receives its contiguous slice of `A` (the coordinator keeps
//!    slice 0 without a transfer),
//! 4. each rank computes `slice · B` with its compute backend,
//! 5. the blocks are gathered at the coordinator in rank order and stacked.
//!
//! Validation happens before any message is sent, so an invalid input fails
//! with no traffic at all.

use ndarray::{concatenate, s, Axis};
use rowcast_compute::{CommError, Communicator, ComputeBackend, Element, Rank};

use super::{square_dimension, EngineError, Stage};
use crate::partition::{partition_with, PartitionPolicy};
use crate::types::{Matrix, WorkerAssignment};

/// Rank that owns the inputs and assembles the result.
pub const COORDINATOR: Rank = 0;

fn failure(stage: Stage, rank: Rank, reason: impl ToString) -> EngineError {
    EngineError::DistributedComputeFailure {
        stage,
        rank,
        reason: reason.to_string(),
    }
}

fn comm_failure(stage: Stage, rank: Rank) -> impl FnOnce(CommError) -> EngineError {
    move |e| failure(stage, rank, e)
}

/// Run this rank's share of `C = A · B`.
///
/// The coordinator passes `Some((a, b))` and gets `Some(c)` back; every other
/// rank passes `None` and gets `None` once its block has been handed off.
pub fn execute_rank<T, C>(
    comm: &C,
    inputs: Option<(&Matrix<T>, &Matrix<T>)>,
    backend: &dyn ComputeBackend<T>,
    policy: PartitionPolicy,
) -> Result<Option<Matrix<T>>, EngineError>
where
    T: Element,
    C: Communicator<T> + ?Sized,
{
    let rank = comm.rank();
    let workers = comm.size();
    let is_coordinator = rank == COORDINATOR;

    // Step 1: only the coordinator has inputs to check.
    let root_inputs = if is_coordinator {
        let (a, b) = inputs.ok_or_else(|| {
            failure(Stage::Launch, rank, "coordinator started without input matrices")
        })?;
        let n = square_dimension(a, b)?;
        let assignment = partition_with(n, workers, policy)?;
        Some((a, b, assignment))
    } else {
        None
    };

    // Step 2: broadcast B.
    let b = comm
        .broadcast(COORDINATOR, root_inputs.as_ref().map(|(_, b, _)| (*b).clone()))
        .map_err(comm_failure(Stage::Broadcast, rank))?;
    let n = b.nrows();
    if b.ncols() != n || n == 0 {
        return Err(failure(
            Stage::Broadcast,
            rank,
            format!("received a {}x{} right operand", b.nrows(), b.ncols()),
        ));
    }

    // Step 3: scatter row slices of A.
    let assignment: WorkerAssignment = match &root_inputs {
        Some((_, _, assignment)) => assignment.clone(),
        None => partition_with(n, workers, policy).map_err(|e| failure(Stage::Scatter, rank, e))?,
    };
    let parts = root_inputs.as_ref().map(|(a, _, assignment)| {
        assignment
            .iter()
            .map(|r| a.slice(s![r.start..r.end, ..]).to_owned())
            .collect()
    });
    let slice = comm
        .scatter(COORDINATOR, parts)
        .map_err(comm_failure(Stage::Scatter, rank))?;

    let expected_rows = assignment.range(rank).map_or(0, |r| r.len());
    if slice.dim() != (expected_rows, n) {
        return Err(failure(
            Stage::Scatter,
            rank,
            format!(
                "received a {}x{} slice, expected {}x{}",
                slice.nrows(),
                slice.ncols(),
                expected_rows,
                n
            ),
        ));
    }
    log::trace!("rank {rank}: {expected_rows} rows of {n}");

    // Step 4: local block.
    let block = backend
        .multiply_rows(slice.view(), b.view())
        .map_err(|e| failure(Stage::Compute, rank, e))?;

    // Step 5: gather and stack.
    let gathered = comm
        .gather(COORDINATOR, block)
        .map_err(comm_failure(Stage::Gather, rank))?;
    let Some(blocks) = gathered else {
        return Ok(None);
    };

    for (source, (part, range)) in blocks.iter().zip(assignment.iter()).enumerate() {
        if part.dim() != (range.len(), n) {
            return Err(failure(
                Stage::Gather,
                source,
                format!(
                    "returned a {}x{} block for rows {}",
                    part.nrows(),
                    part.ncols(),
                    range
                ),
            ));
        }
    }

    let views: Vec<_> = blocks.iter().map(|m| m.view()).collect();
    let c = concatenate(Axis(0), &views).map_err(|e| failure(Stage::Gather, rank, e))?;
    Ok(Some(c))
}
