//! # Rowcast Compute
//!
//! Execution substrate for the Rowcast engines. This crate provides:
//!
//! - **Elements** ([`element`]): the `f32`/`f64` widths the engines run at.
//! - **Compute backends** ([`backend`], [`cpu`]): the local row-block kernel
//!   each rank runs, behind the [`ComputeBackend`](backend::ComputeBackend)
//!   trait.
//! - **Process groups** ([`comm`]): rank-addressed message passing with
//!   broadcast, scatter, gather and barrier collectives, and an in-process
//!   channel implementation.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Status |
//! |---------|-------------|--------|
//! | CPU (Rayon) | `cpu` (default) | Implemented |

pub mod backend;
pub mod comm;
pub mod element;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{ComputeBackend, ComputeError, DeviceInfo};
pub use comm::local::{LocalEndpoint, LocalGroup, Traffic, TrafficSnapshot};
pub use comm::{CommError, Communicator, Payload, Rank, Tag};
pub use element::Element;

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;
