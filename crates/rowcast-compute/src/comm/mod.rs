//! Message-passing process groups.
//!
//! A [`Communicator`] is one rank's view of a fixed-size group: it knows its
//! own rank and the group size, and can send and receive tagged payloads to
//! and from any other rank. Nothing else is shared between ranks.
//!
//! The three collectives used by the row-partitioned multiply (broadcast,
//! scatter, gather) plus a barrier are provided methods built from
//! point-to-point fan-out and fan-in through the root. Every call blocks
//! until this rank's part of the collective is complete; a collective that
//! cannot deliver its payload fails with a [`CommError`] and is not retried.
//!
//! [`local`] provides an in-process implementation where each rank is a
//! thread and each ordered pair of ranks is connected by a channel.

pub mod local;

use std::fmt;
use std::time::Duration;

use ndarray::Array2;
use thiserror::Error;

use crate::element::Element;

/// Zero-based identity of a participant in a group.
pub type Rank = usize;

/// Message tag. A receive names the tag it expects; anything else arriving
/// from that source is a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Broadcast,
    Scatter,
    Gather,
    Barrier,
    User(u32),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Broadcast => write!(f, "broadcast"),
            Tag::Scatter => write!(f, "scatter"),
            Tag::Gather => write!(f, "gather"),
            Tag::Barrier => write!(f, "barrier"),
            Tag::User(n) => write!(f, "user:{n}"),
        }
    }
}

/// Message body. Matrices move by value; the sender keeps no reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    Matrix(Array2<T>),
    Signal,
}

impl<T> Payload<T> {
    /// Number of matrix elements carried.
    pub fn element_count(&self) -> usize {
        match self {
            Payload::Matrix(m) => m.len(),
            Payload::Signal => 0,
        }
    }
}

/// Errors from point-to-point or collective communication.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("Process group must contain at least one rank")]
    EmptyGroup,

    #[error("Rank {rank} is outside a group of {size}")]
    InvalidRank { rank: Rank, size: usize },

    #[error("Rank {peer} disconnected")]
    Disconnected { peer: Rank },

    #[error("Timed out after {timeout:?} waiting for rank {peer}")]
    Timeout { peer: Rank, timeout: Duration },

    #[error("Expected a {expected} message from rank {peer}, received {received}")]
    UnexpectedTag {
        peer: Rank,
        expected: Tag,
        received: Tag,
    },

    #[error("Expected a matrix payload from rank {peer}")]
    UnexpectedPayload { peer: Rank },

    #[error("Root supplied {supplied} scatter parts for a group of {size}")]
    PartCount { supplied: usize, size: usize },

    #[error("Root rank {root} did not supply input for the {tag} collective")]
    MissingRootInput { root: Rank, tag: Tag },
}

/// One rank's endpoint in a process group.
pub trait Communicator<T: Element>: Send {
    /// This rank's identity.
    fn rank(&self) -> Rank;

    /// Total number of ranks in the group.
    fn size(&self) -> usize;

    /// Deliver `payload` to `dest`. Returns once the payload is handed off.
    fn send(&self, dest: Rank, tag: Tag, payload: Payload<T>) -> Result<(), CommError>;

    /// Block until a message from `source` arrives and check its tag.
    fn recv(&self, source: Rank, tag: Tag) -> Result<Payload<T>, CommError>;

    /// Receive a message that must carry a matrix.
    fn recv_matrix(&self, source: Rank, tag: Tag) -> Result<Array2<T>, CommError> {
        match self.recv(source, tag)? {
            Payload::Matrix(m) => Ok(m),
            Payload::Signal => Err(CommError::UnexpectedPayload { peer: source }),
        }
    }

    /// Copy `value` from `root` to every rank.
    ///
    /// The root passes `Some(value)`; every other rank passes `None`. All
    /// ranks return the broadcast matrix.
    fn broadcast(&self, root: Rank, value: Option<Array2<T>>) -> Result<Array2<T>, CommError> {
        check_rank(root, self.size())?;
        if self.rank() != root {
            return self.recv_matrix(root, Tag::Broadcast);
        }

        let value = value.ok_or(CommError::MissingRootInput {
            root,
            tag: Tag::Broadcast,
        })?;
        for dest in (0..self.size()).filter(|&r| r != root) {
            self.send(dest, Tag::Broadcast, Payload::Matrix(value.clone()))?;
        }
        Ok(value)
    }

    /// Hand part `r` of `parts` to rank `r`.
    ///
    /// The root passes exactly one part per rank and keeps its own part
    /// without a transfer. Every rank returns the part addressed to it.
    fn scatter(&self, root: Rank, parts: Option<Vec<Array2<T>>>) -> Result<Array2<T>, CommError> {
        check_rank(root, self.size())?;
        if self.rank() != root {
            return self.recv_matrix(root, Tag::Scatter);
        }

        let parts = parts.ok_or(CommError::MissingRootInput {
            root,
            tag: Tag::Scatter,
        })?;
        if parts.len() != self.size() {
            return Err(CommError::PartCount {
                supplied: parts.len(),
                size: self.size(),
            });
        }

        let mut own = None;
        for (dest, part) in parts.into_iter().enumerate() {
            if dest == root {
                own = Some(part);
            } else {
                self.send(dest, Tag::Scatter, Payload::Matrix(part))?;
            }
        }
        own.ok_or(CommError::MissingRootInput {
            root,
            tag: Tag::Scatter,
        })
    }

    /// Collect one part from every rank at `root`, in rank order.
    ///
    /// The root returns `Some(parts)` with `parts[r]` from rank `r`; every
    /// other rank returns `None` once its part is handed off.
    fn gather(&self, root: Rank, part: Array2<T>) -> Result<Option<Vec<Array2<T>>>, CommError> {
        check_rank(root, self.size())?;
        if self.rank() != root {
            self.send(root, Tag::Gather, Payload::Matrix(part))?;
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(self.size());
        for source in 0..self.size() {
            if source == root {
                parts.push(None);
            } else {
                parts.push(Some(self.recv_matrix(source, Tag::Gather)?));
            }
        }
        parts[root] = Some(part);
        Ok(Some(parts.into_iter().flatten().collect()))
    }

    /// Block until every rank has reached the barrier.
    fn barrier(&self, root: Rank) -> Result<(), CommError> {
        check_rank(root, self.size())?;
        let others = (0..self.size()).filter(|&r| r != root);
        if self.rank() == root {
            for source in others.clone() {
                self.recv(source, Tag::Barrier)?;
            }
            for dest in others {
                self.send(dest, Tag::Barrier, Payload::Signal)?;
            }
        } else {
            self.send(root, Tag::Barrier, Payload::Signal)?;
            self.recv(root, Tag::Barrier)?;
        }
        Ok(())
    }
}

fn check_rank(rank: Rank, size: usize) -> Result<(), CommError> {
    if rank >= size {
        return Err(CommError::InvalidRank { rank, size });
    }
    Ok(())
}
