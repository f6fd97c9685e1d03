//! Zero-padded embedding of the input matrix.
//!
//! The input is placed at offset `(depth, depth)` inside an
//! `(N + 2·depth)²` matrix of zeros. Cells beyond the edge of the original
//! matrix therefore contribute nothing to a neighbourhood sum, and the
//! kernel can read a full `(2·depth + 1)²` window around every cell without
//! bounds special-casing.

use ndarray::{s, Array2, ArrayView2};

use crate::types::{ensure_square, GeometryError};

/// An `N×N` integer matrix embedded in a `depth`-wide border of zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedMatrix {
    cells: Array2<i32>,
    matrix_size: usize,
    depth: usize,
}

/// Embed `matrix` into a zero-bordered matrix of side `N + 2 * depth`.
pub fn build_padded(matrix: &Array2<i32>, depth: usize) -> Result<PaddedMatrix, GeometryError> {
    let n = ensure_square(matrix)?;
    let size = n + 2 * depth;

    let mut cells = Array2::<i32>::zeros((size, size));
    cells
        .slice_mut(s![depth..depth + n, depth..depth + n])
        .assign(matrix);

    log::debug!("Padded {}x{} matrix to {}x{} (depth {})", n, n, size, size, depth);

    Ok(PaddedMatrix {
        cells,
        matrix_size: n,
        depth,
    })
}

impl PaddedMatrix {
    /// Side length of the embedded matrix.
    pub fn matrix_size(&self) -> usize {
        self.matrix_size
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Side length of the padded matrix.
    pub fn size(&self) -> usize {
        self.cells.nrows()
    }

    /// The full padded matrix, row-major and contiguous.
    pub fn as_array(&self) -> &Array2<i32> {
        &self.cells
    }

    /// The embedded `N×N` region.
    pub fn interior(&self) -> ArrayView2<'_, i32> {
        let (d, n) = (self.depth, self.matrix_size);
        self.cells.slice(s![d..d + n, d..d + n])
    }

    /// `count` contiguous padded rows starting at `start`.
    pub fn rows(&self, start: usize, count: usize) -> Result<ArrayView2<'_, i32>, GeometryError> {
        let end = start + count;
        if end > self.size() {
            return Err(GeometryError::RowRangeOutOfBounds {
                start,
                end,
                available: self.size(),
            });
        }
        Ok(self.cells.slice(s![start..end, ..]))
    }

    /// Cell at a 0-based padded position.
    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        self.cells.get((row, col)).copied()
    }
}
