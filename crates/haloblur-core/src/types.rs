//! Core types shared across haloblur.
//!
//! This module defines the scalar run parameters that are broadcast to every
//! worker, the weighting modes understood by the kernel, and the geometry
//! errors raised when a matrix or block does not have the shape the run
//! expects.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a matrix, block or gathered transfer has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("Matrix size must be at least 1")]
    EmptyMatrix,

    #[error("Matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Expected a {expected_rows}x{expected_cols} block, got {rows}x{cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Rows {start}..{end} exceed the {available} rows available")]
    RowRangeOutOfBounds {
        start: usize,
        end: usize,
        available: usize,
    },

    #[error("Worker {worker} transferred {actual} elements, expected {expected}")]
    TransferSize {
        worker: usize,
        expected: usize,
        actual: usize,
    },

    #[error("No block planned for worker {0}")]
    UnknownWorker(usize),

    #[error("Block from worker {0} was gathered more than once")]
    DuplicateBlock(usize),

    #[error("Block from worker {0} is missing from the gathered results")]
    MissingBlock(usize),
}

/// Scalars every worker needs before distribution starts.
///
/// These are the only values that cross the coordinator/worker boundary
/// ahead of the row data. `depth` is always stored clamped to
/// `matrix_size - 1`: a neighbourhood wider than the matrix only adds padding
/// zeros and never changes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlurParams {
    /// Side length `N` of the square input matrix.
    pub matrix_size: usize,
    /// Neighbourhood radius, already clamped.
    pub depth: usize,
}

impl BlurParams {
    /// Validate the matrix size and clamp `depth`.
    pub fn new(matrix_size: usize, depth: usize) -> Result<Self, GeometryError> {
        if matrix_size == 0 {
            return Err(GeometryError::EmptyMatrix);
        }
        Ok(Self {
            matrix_size,
            depth: clamp_depth(depth, matrix_size),
        })
    }

    /// Side length of the zero-padded matrix, `N + 2 * depth`.
    pub fn padded_size(&self) -> usize {
        self.matrix_size + 2 * self.depth
    }

    /// Side length of the neighbourhood window, `2 * depth + 1`.
    pub fn window(&self) -> usize {
        2 * self.depth + 1
    }
}

/// Clamp a requested depth to `matrix_size - 1`.
pub fn clamp_depth(depth: usize, matrix_size: usize) -> usize {
    depth.min(matrix_size.saturating_sub(1))
}

/// How neighbour contributions are combined into an output cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Weighting {
    /// Plain sum of `value / d` over every neighbour at ring distance `d >= 1`.
    #[default]
    RingSum,
    /// Ring sum divided by the total weight of the neighbours that lie inside
    /// the matrix, so a constant matrix maps onto itself.
    Normalised,
}

impl std::fmt::Display for Weighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Weighting::RingSum => write!(f, "ring-sum"),
            Weighting::Normalised => write!(f, "normalised"),
        }
    }
}

impl std::str::FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ring-sum" | "ringsum" | "sum" => Ok(Weighting::RingSum),
            "normalised" | "normalized" => Ok(Weighting::Normalised),
            other => Err(format!(
                "Unknown weighting '{}'. Valid values: ring-sum, normalised",
                other
            )),
        }
    }
}

/// Return the side length of a square matrix, rejecting empty or
/// rectangular input.
pub fn ensure_square<T>(matrix: &Array2<T>) -> Result<usize, GeometryError> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(GeometryError::NotSquare { rows, cols });
    }
    if rows == 0 {
        return Err(GeometryError::EmptyMatrix);
    }
    Ok(rows)
}
