//! Compute backend trait and device abstraction.
//!
//! The [`BlurBackend`] trait abstracts over how the blur is executed (a
//! single Rayon-parallel worker, or a coordinator driving a fixed pool of
//! workers) so that the CLI and tests can swap execution strategies without
//! touching the numerics in `haloblur-core`.

use haloblur_core::{BlurParams, GeometryError, PartitionError, Weighting};
use ndarray::Array2;
use thiserror::Error;

/// Errors originating from compute backends.
///
/// Any of these aborts the whole run; no backend retries or returns partial
/// results.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] PartitionError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Coordination failure: {0}")]
    Coordination(String),

    #[error("Worker {worker} failed: {message}")]
    WorkerFailed { worker: usize, message: String },

    #[error("Backend not available: {0}")]
    Unavailable(String),
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    /// Number of workers the matrix is partitioned across.
    pub workers: usize,
    /// Threads available to each worker's kernel.
    pub threads_per_worker: usize,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Cpu,
    Distributed,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Cpu => write!(f, "cpu"),
            BackendType::Distributed => write!(f, "distributed"),
        }
    }
}

/// Abstraction over blur execution strategies.
pub trait BlurBackend: Send + Sync {
    /// Return information about the backend.
    fn device_info(&self) -> DeviceInfo;

    /// Blur a square integer matrix.
    ///
    /// `params.matrix_size` must equal the side of `matrix`; `params.depth`
    /// is expected to be clamped already (see [`BlurParams::new`]). The
    /// result is rounded half away from zero.
    fn convolve(
        &self,
        matrix: &Array2<i32>,
        params: &BlurParams,
        weighting: Weighting,
    ) -> Result<Array2<i32>, ComputeError>;
}

/// Reject a matrix whose side disagrees with the broadcast parameters.
pub(crate) fn check_input(matrix: &Array2<i32>, params: &BlurParams) -> Result<(), ComputeError> {
    let n = haloblur_core::types::ensure_square(matrix)?;
    if n != params.matrix_size {
        return Err(GeometryError::ShapeMismatch {
            expected_rows: params.matrix_size,
            expected_cols: params.matrix_size,
            rows: n,
            cols: n,
        }
        .into());
    }
    Ok(())
}
