//! Chebyshev-ring weighted neighbourhood sum.
//!
//! Every output cell is the sum over its `(2·depth + 1)²` window of
//! `value / d`, where `d` is the Chebyshev ("ring") distance of the
//! neighbour from the cell:
//!
//! $$ y_{r,c} = \sum_{d(i,j) \ge 1} \frac{x_{i,j}}{d(i,j)}, \qquad
//!    d(i,j) = \max(|i - r|, |j - c|) $$
//!
//! The centre cell never contributes to its own sum. The kernel reads from a
//! zero-padded block, so neighbours beyond the matrix edge add nothing.
//! Accumulation is in `f64` and follows window row-major order, so every
//! backend produces bit-identical sums for the same input.

use ndarray::{s, Array2, ArrayView2};

use crate::partition::RowBlock;
use crate::types::{BlurParams, GeometryError, Weighting};

/// Chebyshev distance of every window position from the window centre.
fn ring_distances(depth: usize) -> Array2<usize> {
    let span = 2 * depth + 1;
    Array2::from_shape_fn((span, span), |(i, j)| i.abs_diff(depth).max(j.abs_diff(depth)))
}

/// Check that a padded block has `row_count + 2·depth` rows of width
/// `N + 2·depth`.
fn check_block(
    depth: usize,
    row_count: usize,
    matrix_size: usize,
    padded_block: &ArrayView2<'_, i32>,
) -> Result<(), GeometryError> {
    let expected_rows = row_count + 2 * depth;
    let expected_cols = matrix_size + 2 * depth;
    let (rows, cols) = padded_block.dim();
    if rows != expected_rows || cols != expected_cols {
        return Err(GeometryError::ShapeMismatch {
            expected_rows,
            expected_cols,
            rows,
            cols,
        });
    }
    Ok(())
}

/// Ring sum for one output row `r` of a checked block.
fn ring_sum_row(
    distances: &Array2<usize>,
    matrix_size: usize,
    padded_block: &ArrayView2<'_, i32>,
    r: usize,
) -> Vec<f64> {
    let span = distances.nrows();
    (0..matrix_size)
        .map(|c| {
            let window = padded_block.slice(s![r..r + span, c..c + span]);
            window
                .iter()
                .zip(distances.iter())
                .filter(|(_, &d)| d != 0)
                .map(|(&value, &d)| f64::from(value) / d as f64)
                .sum::<f64>()
        })
        .collect()
}

/// Weighted ring sum of every owned cell of a padded block.
///
/// `padded_block` holds `row_count + 2·depth` padded rows of width
/// `N + 2·depth`; the result is `row_count × N`.
pub fn weighted_sum(
    depth: usize,
    row_count: usize,
    matrix_size: usize,
    padded_block: ArrayView2<'_, i32>,
) -> Result<Array2<f64>, GeometryError> {
    check_block(depth, row_count, matrix_size, &padded_block)?;
    let distances = ring_distances(depth);

    let mut out = Array2::<f64>::zeros((row_count, matrix_size));
    for (r, mut row) in out.outer_iter_mut().enumerate() {
        let sums = ring_sum_row(&distances, matrix_size, &padded_block, r);
        row.iter_mut().zip(sums).for_each(|(cell, v)| *cell = v);
    }
    Ok(out)
}

/// A kernel configured for one run.
///
/// Holds the precomputed ring-distance window so workers can evaluate rows
/// independently, and applies the requested [`Weighting`].
#[derive(Debug, Clone)]
pub struct Kernel {
    params: BlurParams,
    weighting: Weighting,
    distances: Array2<usize>,
}

impl Kernel {
    pub fn new(params: BlurParams, weighting: Weighting) -> Self {
        Self {
            params,
            weighting,
            distances: ring_distances(params.depth),
        }
    }

    pub fn params(&self) -> &BlurParams {
        &self.params
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// Verify that `padded_block` is the halo block planned for `block`.
    pub fn check(&self, block: &RowBlock, padded_block: &ArrayView2<'_, i32>) -> Result<(), GeometryError> {
        check_block(
            self.params.depth,
            block.row_count,
            self.params.matrix_size,
            padded_block,
        )
    }

    /// Compute owned row `r` (0-based within the block) of a checked block.
    pub fn convolve_row(&self, block: &RowBlock, padded_block: &ArrayView2<'_, i32>, r: usize) -> Vec<f64> {
        let n = self.params.matrix_size;
        let mut row = ring_sum_row(&self.distances, n, padded_block, r);
        if self.weighting == Weighting::Normalised {
            let global_row = block.start_row + r;
            for (c, value) in row.iter_mut().enumerate() {
                let total = self.in_matrix_weight(global_row, c);
                *value = if total > 0.0 {
                    *value / total
                } else {
                    // No neighbours inside the matrix: the cell keeps its value.
                    let d = self.params.depth;
                    f64::from(padded_block[[r + d, c + d]])
                };
            }
        }
        row
    }

    /// Compute every owned row of `block` from its padded halo block.
    pub fn apply(&self, block: &RowBlock, padded_block: ArrayView2<'_, i32>) -> Result<Array2<f64>, GeometryError> {
        self.check(block, &padded_block)?;
        let n = self.params.matrix_size;
        let mut out = Array2::<f64>::zeros((block.row_count, n));
        for (r, mut row) in out.outer_iter_mut().enumerate() {
            let values = self.convolve_row(block, &padded_block, r);
            row.iter_mut().zip(values).for_each(|(cell, v)| *cell = v);
        }
        Ok(out)
    }

    /// Total `1/d` weight of the neighbours of `(row, col)` that lie inside
    /// the matrix.
    fn in_matrix_weight(&self, row: usize, col: usize) -> f64 {
        let n = self.params.matrix_size as isize;
        let depth = self.params.depth as isize;
        let (row, col) = (row as isize, col as isize);
        self.distances
            .indexed_iter()
            .filter(|(_, &d)| d != 0)
            .filter(|((i, j), _)| {
                let gr = row + *i as isize - depth;
                let gc = col + *j as isize - depth;
                (0..n).contains(&gr) && (0..n).contains(&gc)
            })
            .map(|(_, &d)| 1.0 / d as f64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::padding::build_padded;
    use crate::partition::plan;
    use approx::assert_abs_diff_eq;

    fn whole_block(n: usize, depth: usize) -> RowBlock {
        *plan(n, 1, depth).unwrap().block(0).unwrap()
    }

    #[test]
    fn test_ring_distances() {
        let d = ring_distances(2);
        assert_eq!(d[[2, 2]], 0);
        assert_eq!(d[[1, 2]], 1);
        assert_eq!(d[[0, 4]], 2);
        assert_eq!(d[[3, 0]], 2);
    }

    #[test]
    fn test_corner_uses_only_existing_neighbours() {
        let m = Array2::from_shape_vec((3, 3), (1..=9).collect()).unwrap();
        let padded = build_padded(&m, 1).unwrap();
        let out = weighted_sum(1, 3, 3, padded.as_array().view()).unwrap();
        // 2 + 4 + 5, the five out-of-matrix neighbours are zero
        assert_abs_diff_eq!(out[[0, 0]], 11.0);
        // all eight neighbours of the centre
        assert_abs_diff_eq!(out[[1, 1]], 40.0);
    }

    #[test]
    fn test_second_ring_is_halved() {
        let m = Array2::from_shape_vec((3, 3), (1..=9).collect()).unwrap();
        let padded = build_padded(&m, 2).unwrap();
        let out = weighted_sum(2, 3, 3, padded.as_array().view()).unwrap();
        // ring 1: 2 + 4 + 5, ring 2: (3 + 6 + 7 + 8 + 9) / 2
        assert_abs_diff_eq!(out[[0, 0]], 11.0 + 16.5);
    }

    #[test]
    fn test_zero_depth_gives_zero() {
        let m = Array2::from_elem((2, 2), 9);
        let padded = build_padded(&m, 0).unwrap();
        let out = weighted_sum(0, 2, 2, padded.as_array().view()).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_block_shape_checked() {
        let padded = Array2::<i32>::zeros((4, 5));
        let err = weighted_sum(1, 3, 3, padded.view()).unwrap_err();
        assert_eq!(
            err,
            GeometryError::ShapeMismatch {
                expected_rows: 5,
                expected_cols: 5,
                rows: 4,
                cols: 5
            }
        );
    }

    #[test]
    fn test_normalised_constant_matrix_is_fixed_point() {
        let m = Array2::from_elem((5, 5), 7);
        let params = BlurParams::new(5, 1).unwrap();
        let kernel = Kernel::new(params, Weighting::Normalised);
        let padded = build_padded(&m, 1).unwrap();
        let out = kernel.apply(&whole_block(5, 1), padded.as_array().view()).unwrap();
        for &v in out.iter() {
            assert_abs_diff_eq!(v, 7.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_ring_sum_constant_matrix_scales_by_weight() {
        let m = Array2::from_elem((5, 5), 7);
        let params = BlurParams::new(5, 1).unwrap();
        let kernel = Kernel::new(params, Weighting::RingSum);
        let padded = build_padded(&m, 1).unwrap();
        let out = kernel.apply(&whole_block(5, 1), padded.as_array().view()).unwrap();
        assert_abs_diff_eq!(out[[2, 2]], 56.0);
        assert_abs_diff_eq!(out[[0, 0]], 21.0);
        assert_abs_diff_eq!(out[[0, 2]], 35.0);
    }

    #[test]
    fn test_normalised_single_cell_keeps_value() {
        let m = Array2::from_elem((1, 1), 42);
        let params = BlurParams::new(1, 3).unwrap();
        let kernel = Kernel::new(params, Weighting::Normalised);
        let padded = build_padded(&m, params.depth).unwrap();
        let out = kernel.apply(&whole_block(1, 0), padded.as_array().view()).unwrap();
        assert_abs_diff_eq!(out[[0, 0]], 42.0);
    }

    #[test]
    fn test_kernel_matches_free_function() {
        let m = Array2::from_shape_fn((6, 6), |(r, c)| ((r * 7 + c * 3) % 11) as i32 - 5);
        let params = BlurParams::new(6, 2).unwrap();
        let kernel = Kernel::new(params, Weighting::RingSum);
        let padded = build_padded(&m, 2).unwrap();
        let a = kernel.apply(&whole_block(6, 2), padded.as_array().view()).unwrap();
        let b = weighted_sum(2, 6, 6, padded.as_array().view()).unwrap();
        assert_eq!(a, b);
    }
}
