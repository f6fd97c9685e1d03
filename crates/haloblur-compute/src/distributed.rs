//! Distributed compute backend: one coordinator, a fixed pool of workers.
//!
//! The strategy is block-row distribution:
//!
//! - **Planning and padding** happen once, on the coordinator.
//! - **Scatter**: each worker receives its owned rows plus a `depth`-wide
//!   halo above and below, copied out of the padded matrix.
//! - **Compute**: workers run the kernel on their private block only.
//! - **Gather**: owned rows come back and are placed by the coordinator.
//!
//! Workers are scoped threads connected by `mpsc` channels; see
//! [`channel`](crate::channel) for the phase protocol. The coordinator does
//! not compute a share itself.

use std::sync::mpsc;
use std::thread;

use haloblur_core::{assemble, build_padded, plan, BlurParams, Weighting};
use ndarray::Array2;

use crate::backend::{check_input, BackendType, BlurBackend, ComputeError, DeviceInfo};
use crate::channel::Coordinator;
use crate::worker;

/// Coordinator/worker backend with a fixed worker count.
#[derive(Debug, Clone)]
pub struct DistributedBackend {
    workers: usize,
}

impl DistributedBackend {
    /// Create a backend that partitions every matrix across `workers`.
    ///
    /// The count is validated against each matrix in
    /// [`convolve`](BlurBackend::convolve): it must be between 1 and `N`.
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl BlurBackend for DistributedBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("Distributed ({} workers)", self.workers),
            backend_type: BackendType::Distributed,
            workers: self.workers,
            threads_per_worker: 1,
        }
    }

    fn convolve(
        &self,
        matrix: &Array2<i32>,
        params: &BlurParams,
        weighting: Weighting,
    ) -> Result<Array2<i32>, ComputeError> {
        check_input(matrix, params)?;

        // Configuration errors surface here, before any worker exists.
        let plan = plan(params.matrix_size, self.workers, params.depth)?;
        let padded = build_padded(matrix, params.depth)?;

        log::info!(
            "Distributing {}x{} matrix (depth {}) across {} workers: base {} rows, overflow {}",
            params.matrix_size,
            params.matrix_size,
            params.depth,
            plan.workers(),
            plan.base(),
            plan.overflow()
        );

        thread::scope(|scope| -> Result<Array2<i32>, ComputeError> {
            let (reply_tx, reply_rx) = mpsc::channel();
            let mut commands = Vec::with_capacity(plan.workers());

            for id in 0..plan.workers() {
                let (command_tx, command_rx) = mpsc::channel();
                let replies = reply_tx.clone();
                thread::Builder::new()
                    .name(format!("haloblur-worker-{}", id))
                    .spawn_scoped(scope, move || worker::run(id, command_rx, replies))
                    .map_err(|e| ComputeError::Unavailable(format!("failed to spawn worker {}: {}", id, e)))?;
                commands.push(command_tx);
            }
            // Only workers hold reply senders from here on.
            drop(reply_tx);

            let coordinator = Coordinator::new(&plan, commands, reply_rx)?;
            coordinator.broadcast(*params, weighting)?;
            coordinator.scatter(&padded)?;
            coordinator.compute()?;
            let blocks = coordinator.gather()?;

            Ok(assemble(&plan, &blocks)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haloblur_core::PartitionError;

    #[test]
    fn test_more_workers_than_rows_rejected() {
        let m = Array2::<i32>::zeros((3, 3));
        let params = BlurParams::new(3, 1).unwrap();
        let err = DistributedBackend::new(4)
            .convolve(&m, &params, Weighting::RingSum)
            .unwrap_err();
        assert!(matches!(
            err,
            ComputeError::Configuration(PartitionError::TooManyWorkers { workers: 4, matrix_size: 3 })
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let m = Array2::<i32>::zeros((3, 3));
        let params = BlurParams::new(3, 1).unwrap();
        let err = DistributedBackend::new(0)
            .convolve(&m, &params, Weighting::RingSum)
            .unwrap_err();
        assert!(matches!(err, ComputeError::Configuration(PartitionError::NoWorkers)));
    }

    #[test]
    fn test_one_row_per_worker() {
        let m = Array2::from_shape_vec((3, 3), (1..=9).collect()).unwrap();
        let params = BlurParams::new(3, 1).unwrap();
        let out = DistributedBackend::new(3)
            .convolve(&m, &params, Weighting::RingSum)
            .unwrap();
        assert_eq!(out[[0, 0]], 11);
        assert_eq!(out[[1, 1]], 40);
    }

    #[test]
    fn test_device_info() {
        let info = DistributedBackend::new(5).device_info();
        assert_eq!(info.backend_type, BackendType::Distributed);
        assert_eq!(info.workers, 5);
        assert_eq!(info.name, "Distributed (5 workers)");
    }
}
