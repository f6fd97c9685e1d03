//! Assembly of gathered blocks into the integer result matrix.
//!
//! Each worker returns its owned rows as a flat row-major run of `f64`
//! values. The assembler copies every run to its gather-table displacement,
//! checks that each planned block arrived exactly once with the planned
//! length, and rounds the accumulated values half away from zero.

use ndarray::Array2;

use crate::partition::PartitionPlan;
use crate::types::GeometryError;

/// Computed rows returned by one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct GatheredBlock {
    /// Worker the block was planned for.
    pub worker: usize,
    /// `row_count × N` values, row-major.
    pub values: Vec<f64>,
}

/// Round half away from zero, saturating at the `i32` range.
pub fn round_cell(value: f64) -> i32 {
    // `as` saturates out-of-range values and maps NaN to 0.
    value.round() as i32
}

/// Round every cell of an accumulation matrix.
pub fn round_matrix(accumulated: &Array2<f64>) -> Array2<i32> {
    accumulated.mapv(round_cell)
}

/// Merge gathered blocks into the `N×N` result.
///
/// Blocks may arrive in any order; they are placed by the gather-table
/// displacement of their worker.
pub fn assemble(plan: &PartitionPlan, blocks: &[GatheredBlock]) -> Result<Array2<i32>, GeometryError> {
    let n = plan.matrix_size();
    let table = plan.gather_table();
    let mut accumulated = vec![0.0_f64; n * n];
    let mut seen = vec![false; plan.workers()];

    for block in blocks {
        let range = table
            .range(block.worker)
            .ok_or(GeometryError::UnknownWorker(block.worker))?;
        if seen[block.worker] {
            return Err(GeometryError::DuplicateBlock(block.worker));
        }
        if block.values.len() != range.len() {
            return Err(GeometryError::TransferSize {
                worker: block.worker,
                expected: range.len(),
                actual: block.values.len(),
            });
        }
        accumulated[range].copy_from_slice(&block.values);
        seen[block.worker] = true;
    }

    if let Some(missing) = seen.iter().position(|&s| !s) {
        return Err(GeometryError::MissingBlock(missing));
    }

    let cells = accumulated.into_iter().map(round_cell).collect();
    Array2::from_shape_vec((n, n), cells).map_err(|_| GeometryError::ShapeMismatch {
        expected_rows: n,
        expected_cols: n,
        rows: 0,
        cols: 0,
    })
}
