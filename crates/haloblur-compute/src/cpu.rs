//! CPU compute backend using Rayon for shared-memory parallelism.
//!
//! The whole matrix is planned as a single block and owned rows are
//! computed in parallel. This is the non-distributed reference path: every
//! other backend must reproduce its output exactly.

use haloblur_core::{assemble, build_padded, plan, BlurParams, GatheredBlock, Kernel, Weighting};
use ndarray::Array2;
use rayon::prelude::*;

use crate::backend::{check_input, BackendType, BlurBackend, ComputeError, DeviceInfo};

/// CPU backend that parallelises rows across threads via Rayon.
pub struct CpuBackend {
    num_threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl CpuBackend {
    /// Create a new CPU backend using the global Rayon pool.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Create a CPU backend with a dedicated pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("haloblur-cpu-{}", i))
            .build()
            .map_err(|e| ComputeError::Unavailable(e.to_string()))?;
        Ok(Self {
            num_threads: pool.current_num_threads(),
            pool: Some(pool),
        })
    }

    fn blur(
        &self,
        matrix: &Array2<i32>,
        params: &BlurParams,
        weighting: Weighting,
    ) -> Result<Array2<i32>, ComputeError> {
        let plan = plan(params.matrix_size, 1, params.depth)?;
        let padded = build_padded(matrix, params.depth)?;
        let kernel = Kernel::new(*params, weighting);

        let block = &plan.blocks()[0];
        let rows = padded.rows(block.start_row, block.halo_row_count)?;
        kernel.check(block, &rows)?;

        let values: Vec<f64> = (0..block.row_count)
            .into_par_iter()
            .flat_map_iter(|r| kernel.convolve_row(block, &rows, r))
            .collect();

        let gathered = GatheredBlock {
            worker: block.worker,
            values,
        };
        Ok(assemble(&plan, &[gathered])?)
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BlurBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            workers: 1,
            threads_per_worker: self.num_threads,
        }
    }

    fn convolve(
        &self,
        matrix: &Array2<i32>,
        params: &BlurParams,
        weighting: Weighting,
    ) -> Result<Array2<i32>, ComputeError> {
        check_input(matrix, params)?;
        log::debug!(
            "CPU blur: N={}, depth={}, weighting={}, threads={}",
            params.matrix_size,
            params.depth,
            weighting,
            self.num_threads
        );
        match &self.pool {
            Some(pool) => pool.install(|| self.blur(matrix, params, weighting)),
            None => self.blur(matrix, params, weighting),
        }
    }
}
