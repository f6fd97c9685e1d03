//! # Haloblur IO
//!
//! Row-addressed access to square integer matrices stored as flat,
//! header-less, row-major files of 4-byte little-endian `i32` cells.
//!
//! Rows and columns are **1-based** at this boundary, matching the logical
//! matrix: cell `(row, col)` lives at byte offset
//! `((row - 1) * N + (col - 1)) * 4`.
//!
//! - [`MatrixSource`] / [`MatrixSink`]: the traits the blur pipeline reads
//!   from and writes to.
//! - [`raw`]: seek-based implementations over any `Read + Seek` /
//!   `Write + Seek`, with file-opening helpers.
//! - [`render`]: plain-text rendering for inspecting matrices.

pub mod raw;
pub mod render;

use ndarray::Array2;
use thiserror::Error;

pub use raw::{RawMatrixReader, RawMatrixWriter, ELEMENT_SIZE};

/// Errors reading or writing matrix files.
#[derive(Debug, Error)]
pub enum MatrixIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Row {row} is out of range for a {matrix_size}x{matrix_size} matrix")]
    RowOutOfRange { row: usize, matrix_size: usize },

    #[error("Cell ({row}, {col}) is out of range for a {matrix_size}x{matrix_size} matrix")]
    SlotOutOfRange {
        row: usize,
        col: usize,
        matrix_size: usize,
    },

    #[error("Short read at row {row}: the file ends before the row does")]
    ShortRead { row: usize },

    #[error("Row {row} has {actual} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("File holds {actual} bytes, a {matrix_size}x{matrix_size} matrix needs {expected}")]
    Truncated {
        matrix_size: usize,
        expected: u64,
        actual: u64,
    },

    #[error("Matrix is {rows}x{cols}, expected {matrix_size}x{matrix_size}")]
    SizeMismatch {
        matrix_size: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Byte offset of cell ({row}, {col}) overflows")]
    OffsetOverflow { row: usize, col: usize },
}

/// Yields rows of a square integer matrix by 1-based index.
pub trait MatrixSource {
    /// Side length `N` of the matrix.
    fn matrix_size(&self) -> usize;

    /// Read row `row` (`1..=N`).
    fn read_row(&mut self, row: usize) -> Result<Vec<i32>, MatrixIoError>;

    /// Read the single cell at (`row`, `col`), both `1..=N`.
    fn read_slot(&mut self, row: usize, col: usize) -> Result<i32, MatrixIoError>;
}

/// Accepts rows of a square integer matrix by 1-based index.
pub trait MatrixSink {
    /// Side length `N` of the matrix.
    fn matrix_size(&self) -> usize;

    /// Write `values` (exactly `N` of them) as row `row` (`1..=N`).
    fn write_row(&mut self, row: usize, values: &[i32]) -> Result<(), MatrixIoError>;

    /// Write one cell at (`row`, `col`), both `1..=N`.
    fn write_slot(&mut self, row: usize, col: usize, value: i32) -> Result<(), MatrixIoError>;

    /// Push buffered writes to the underlying storage.
    fn flush(&mut self) -> Result<(), MatrixIoError>;
}

/// Read every row of `source` into an `N×N` array.
pub fn read_matrix<S: MatrixSource + ?Sized>(source: &mut S) -> Result<Array2<i32>, MatrixIoError> {
    let n = source.matrix_size();
    let mut cells = Vec::with_capacity(n * n);
    for row in 1..=n {
        cells.extend(source.read_row(row)?);
    }
    Array2::from_shape_vec((n, n), cells).map_err(|_| MatrixIoError::SizeMismatch {
        matrix_size: n,
        rows: n,
        cols: n,
    })
}

/// Write every row of `matrix` to `sink` and flush.
pub fn write_matrix<S: MatrixSink + ?Sized>(sink: &mut S, matrix: &Array2<i32>) -> Result<(), MatrixIoError> {
    let n = sink.matrix_size();
    let (rows, cols) = matrix.dim();
    if rows != n || cols != n {
        return Err(MatrixIoError::SizeMismatch {
            matrix_size: n,
            rows,
            cols,
        });
    }
    for (i, row) in matrix.outer_iter().enumerate() {
        sink.write_row(i + 1, &row.to_vec())?;
    }
    sink.flush()
}
