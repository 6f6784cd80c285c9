//! In-process process group over channels.
//!
//! Each ordered pair of ranks `(src, dst)` gets its own channel, so messages
//! from one source arrive in the order they were sent and a receive can
//! address a specific source. An endpoint is moved into the thread that plays
//! its rank; dropping an endpoint (for example because that thread panicked)
//! shows up at its peers as [`CommError::Disconnected`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use super::{CommError, Communicator, Payload, Rank, Tag};
use crate::element::Element;

struct Envelope<T> {
    tag: Tag,
    payload: Payload<T>,
}

/// Counters shared by all endpoints of a group.
#[derive(Debug, Default)]
pub struct Traffic {
    messages: AtomicU64,
    elements: AtomicU64,
}

/// Point-in-time copy of a group's [`Traffic`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficSnapshot {
    /// Messages handed off by any rank.
    pub messages: u64,
    /// Matrix elements carried by those messages.
    pub elements: u64,
}

impl Traffic {
    fn record(&self, elements: usize) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.elements.fetch_add(elements as u64, Ordering::Relaxed);
    }

    /// Read the current counters.
    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            elements: self.elements.load(Ordering::Relaxed),
        }
    }
}

/// A fixed-size group of in-process ranks.
pub struct LocalGroup<T> {
    endpoints: Vec<LocalEndpoint<T>>,
    traffic: Arc<Traffic>,
}

impl<T: Element> LocalGroup<T> {
    /// Wire up `size` ranks, every one connected to every other.
    pub fn new(size: usize) -> Result<Self, CommError> {
        if size == 0 {
            return Err(CommError::EmptyGroup);
        }

        let traffic = Arc::new(Traffic::default());

        // senders[src][dst] / receivers[dst][src]
        let mut senders: Vec<Vec<Option<Sender<Envelope<T>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut receivers: Vec<Vec<Option<Receiver<Envelope<T>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = mpsc::channel();
                senders[src][dst] = Some(tx);
                receivers[dst][src] = Some(rx);
            }
        }

        let endpoints = senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| LocalEndpoint {
                rank,
                size,
                senders,
                receivers,
                timeout: None,
                traffic: Arc::clone(&traffic),
            })
            .collect();

        Ok(Self { endpoints, traffic })
    }

    /// Fail receives that wait longer than `timeout` instead of blocking forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        for endpoint in &mut self.endpoints {
            endpoint.timeout = timeout;
        }
        self
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.endpoints.len()
    }

    /// Shared traffic counters; stays valid after the endpoints are handed out.
    pub fn traffic(&self) -> Arc<Traffic> {
        Arc::clone(&self.traffic)
    }

    /// Hand out the endpoints, index `r` being rank `r`.
    pub fn into_endpoints(self) -> Vec<LocalEndpoint<T>> {
        self.endpoints
    }
}

/// One rank's endpoint in a [`LocalGroup`].
pub struct LocalEndpoint<T> {
    rank: Rank,
    size: usize,
    senders: Vec<Option<Sender<Envelope<T>>>>,
    receivers: Vec<Option<Receiver<Envelope<T>>>>,
    timeout: Option<Duration>,
    traffic: Arc<Traffic>,
}

impl<T> LocalEndpoint<T> {
    fn invalid(&self, peer: Rank) -> CommError {
        CommError::InvalidRank {
            rank: peer,
            size: self.size,
        }
    }
}

impl<T: Element> Communicator<T> for LocalEndpoint<T> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: Rank, tag: Tag, payload: Payload<T>) -> Result<(), CommError> {
        let tx = self
            .senders
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.invalid(dest))?;

        let elements = payload.element_count();
        tx.send(Envelope { tag, payload })
            .map_err(|_| CommError::Disconnected { peer: dest })?;
        self.traffic.record(elements);
        log::trace!("rank {} -> {}: {} ({} elements)", self.rank, dest, tag, elements);
        Ok(())
    }

    fn recv(&self, source: Rank, tag: Tag) -> Result<Payload<T>, CommError> {
        let rx = self
            .receivers
            .get(source)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.invalid(source))?;

        let envelope = match self.timeout {
            Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => CommError::Timeout {
                    peer: source,
                    timeout,
                },
                RecvTimeoutError::Disconnected => CommError::Disconnected { peer: source },
            })?,
            None => rx
                .recv()
                .map_err(|_| CommError::Disconnected { peer: source })?,
        };

        if envelope.tag != tag {
            return Err(CommError::UnexpectedTag {
                peer: source,
                expected: tag,
                received: envelope.tag,
            });
        }
        Ok(envelope.payload)
    }
}
