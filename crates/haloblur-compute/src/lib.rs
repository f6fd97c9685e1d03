//! # Haloblur Compute
//!
//! Execution backends for haloblur. This crate provides a
//! [`BlurBackend`](backend::BlurBackend) trait that isolates the numerics in
//! `haloblur-core` from how the work is spread over threads.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Workers |
//! |---------|-------------|---------|
//! | CPU (Rayon) | `cpu` (default) | 1, rows parallelised across the Rayon pool |
//! | Distributed | always | `W` scoped worker threads fed over channels |
//!
//! The CPU backend is the reference: for the same matrix, depth and
//! weighting the distributed backend produces identical output for every
//! valid worker count.

pub mod backend;
mod channel;
pub mod distributed;
mod worker;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{BackendType, BlurBackend, ComputeError, DeviceInfo};
pub use distributed::DistributedBackend;

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;
