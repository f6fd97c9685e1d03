//! Row-block partitioning of the matrix across a fixed worker count.
//!
//! A [`PartitionPlan`] assigns every worker a contiguous, non-empty range of
//! output rows. With `base = N / W` and `overflow = N mod W`, the first
//! `overflow` workers own `base + 1` rows and the rest own `base`. A worker
//! owning rows `start..start + count` needs padded rows
//! `start..start + count + 2·depth` to compute them; adjacent workers'
//! halos overlap by `2·depth` rows.
//!
//! Two [`DisplacementTable`]s address flat row-major buffers for transfer:
//! the scatter table over the padded matrix (width `N + 2·depth`, halo rows
//! included) and the gather table over the result (width `N`, owned rows
//! only). Both are derived from the same blocks so they always agree on
//! `start_row` and `row_count`.

use std::ops::Range;

use serde::Serialize;
use thiserror::Error;

/// Configuration errors detected while planning, before any distribution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Matrix size must be at least 1")]
    EmptyMatrix,

    #[error("Number of workers ({workers}) cannot be greater than the matrix dimensions ({matrix_size})")]
    TooManyWorkers { workers: usize, matrix_size: usize },
}

/// One worker's share of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowBlock {
    /// Index of the owning worker.
    pub worker: usize,
    /// First owned output row (0-based). Also the first padded row received.
    pub start_row: usize,
    /// Number of owned output rows, always at least 1.
    pub row_count: usize,
    /// Padded rows received, `row_count + 2 * depth`.
    pub halo_row_count: usize,
}

impl RowBlock {
    /// Owned output rows.
    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.start_row + self.row_count
    }

    /// Padded rows needed to compute the owned rows, halo included.
    pub fn padded_rows(&self) -> Range<usize> {
        self.start_row..self.start_row + self.halo_row_count
    }
}

/// Per-worker element counts and offsets into a flat row-major buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplacementTable {
    /// Row width in elements.
    pub width: usize,
    /// Elements transferred to or from each worker.
    pub counts: Vec<usize>,
    /// Offset of each worker's first element.
    pub displacements: Vec<usize>,
}

impl DisplacementTable {
    /// Element range of `worker` in the flat buffer.
    pub fn range(&self, worker: usize) -> Option<Range<usize>> {
        let start = *self.displacements.get(worker)?;
        let count = *self.counts.get(worker)?;
        Some(start..start + count)
    }

    /// Sum of all transfer counts.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Ordered row blocks for a run, one per worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPlan {
    matrix_size: usize,
    depth: usize,
    base: usize,
    overflow: usize,
    blocks: Vec<RowBlock>,
}

/// Partition `matrix_size` rows across `workers`.
///
/// `workers` must satisfy `1 <= workers <= matrix_size` so that every worker
/// owns at least one row; a zero-length transfer is never planned.
pub fn plan(matrix_size: usize, workers: usize, depth: usize) -> Result<PartitionPlan, PartitionError> {
    if matrix_size == 0 {
        return Err(PartitionError::EmptyMatrix);
    }
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if workers > matrix_size {
        return Err(PartitionError::TooManyWorkers {
            workers,
            matrix_size,
        });
    }

    let base = matrix_size / workers;
    let overflow = matrix_size - workers * base;

    let mut blocks = Vec::with_capacity(workers);
    let mut start_row = 0;
    for worker in 0..workers {
        let row_count = if worker < overflow { base + 1 } else { base };
        blocks.push(RowBlock {
            worker,
            start_row,
            row_count,
            halo_row_count: row_count + 2 * depth,
        });
        start_row += row_count;
    }

    log::debug!(
        "Planned {} rows over {} workers: base {}, overflow {}",
        matrix_size,
        workers,
        base,
        overflow
    );

    Ok(PartitionPlan {
        matrix_size,
        depth,
        base,
        overflow,
        blocks,
    })
}

impl PartitionPlan {
    pub fn matrix_size(&self) -> usize {
        self.matrix_size
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of workers the plan was built for.
    pub fn workers(&self) -> usize {
        self.blocks.len()
    }

    /// Rows owned by every worker beyond the overflow ones.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Number of workers owning one extra row.
    pub fn overflow(&self) -> usize {
        self.overflow
    }

    pub fn blocks(&self) -> &[RowBlock] {
        &self.blocks
    }

    pub fn block(&self, worker: usize) -> Option<&RowBlock> {
        self.blocks.get(worker)
    }

    /// Row width of the padded matrix.
    pub fn padded_width(&self) -> usize {
        self.matrix_size + 2 * self.depth
    }

    /// Offsets into the flat padded matrix for distributing halo blocks.
    pub fn scatter_table(&self) -> DisplacementTable {
        let width = self.padded_width();
        DisplacementTable {
            width,
            counts: self.blocks.iter().map(|b| b.halo_row_count * width).collect(),
            displacements: self.blocks.iter().map(|b| b.start_row * width).collect(),
        }
    }

    /// Offsets into the flat `N×N` result for collecting computed blocks.
    pub fn gather_table(&self) -> DisplacementTable {
        let width = self.matrix_size;
        DisplacementTable {
            width,
            counts: self.blocks.iter().map(|b| b.row_count * width).collect(),
            displacements: self.blocks.iter().map(|b| b.start_row * width).collect(),
        }
    }
}
