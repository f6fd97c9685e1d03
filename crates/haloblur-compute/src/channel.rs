//! Coordinator side of the scatter/gather protocol.
//!
//! The coordinator talks to each worker over a dedicated command channel and
//! receives every reply on one shared channel. A run proceeds in strict
//! phases, and no phase starts until every worker has answered the previous
//! one:
//!
//! 1. **Broadcast** the scalar parameters; wait for `Ready` from all.
//! 2. **Scatter** each worker's halo rows, addressed through the scatter
//!    displacement table; wait for `Received` from all.
//! 3. **Compute** is released to every worker at once.
//! 4. **Gather** one `Gathered` block per worker, checked against the
//!    gather displacement table.
//!
//! Any failure returns immediately. Dropping the [`Coordinator`] drops the
//! command senders, which unblocks and terminates every worker.

use std::sync::mpsc::{Receiver, Sender};

use haloblur_core::{BlurParams, GatheredBlock, PaddedMatrix, PartitionPlan, RowBlock, Weighting};
use ndarray::Array2;

use crate::backend::ComputeError;

/// Messages from the coordinator to one worker.
#[derive(Debug)]
pub(crate) enum Command {
    Broadcast { params: BlurParams, weighting: Weighting },
    Scatter { block: RowBlock, rows: Array2<i32> },
    Compute,
}

/// Messages from a worker to the coordinator.
#[derive(Debug)]
pub(crate) enum Reply {
    Ready { worker: usize },
    Received { worker: usize, elements: usize },
    Gathered { worker: usize, values: Vec<f64> },
    Failed { worker: usize, message: String },
}

/// Phase names, for error messages and logs.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Broadcast,
    Scatter,
    Gather,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Broadcast => write!(f, "broadcast"),
            Phase::Scatter => write!(f, "scatter"),
            Phase::Gather => write!(f, "gather"),
        }
    }
}

pub(crate) struct Coordinator<'a> {
    plan: &'a PartitionPlan,
    commands: Vec<Sender<Command>>,
    replies: Receiver<Reply>,
}

impl<'a> Coordinator<'a> {
    /// `commands[i]` must be the channel to worker `i` of `plan`.
    pub(crate) fn new(
        plan: &'a PartitionPlan,
        commands: Vec<Sender<Command>>,
        replies: Receiver<Reply>,
    ) -> Result<Self, ComputeError> {
        if commands.len() != plan.workers() {
            return Err(ComputeError::Coordination(format!(
                "{} worker channels for a {}-worker plan",
                commands.len(),
                plan.workers()
            )));
        }
        Ok(Self {
            plan,
            commands,
            replies,
        })
    }

    fn send(&self, worker: usize, command: Command) -> Result<(), ComputeError> {
        self.commands[worker]
            .send(command)
            .map_err(|_| ComputeError::Coordination(format!("worker {} hung up", worker)))
    }

    /// Wait for exactly one reply from every worker.
    ///
    /// `accept` validates a reply and returns the worker it came from.
    fn collect<F>(&self, phase: Phase, mut accept: F) -> Result<(), ComputeError>
    where
        F: FnMut(Reply) -> Result<usize, ComputeError>,
    {
        let mut answered = vec![false; self.plan.workers()];
        for _ in 0..self.plan.workers() {
            let reply = self.replies.recv().map_err(|_| {
                ComputeError::Coordination(format!("all workers hung up during {}", phase))
            })?;
            if let Reply::Failed { worker, message } = reply {
                return Err(ComputeError::WorkerFailed { worker, message });
            }
            let worker = accept(reply)?;
            match answered.get_mut(worker) {
                Some(seen) if !*seen => *seen = true,
                Some(_) => {
                    return Err(ComputeError::Coordination(format!(
                        "worker {} answered {} twice",
                        worker, phase
                    )))
                }
                None => {
                    return Err(ComputeError::Coordination(format!(
                        "reply from unknown worker {} during {}",
                        worker, phase
                    )))
                }
            }
        }
        log::debug!("{} complete for {} workers", phase, self.plan.workers());
        Ok(())
    }

    fn unexpected(phase: Phase, reply: &Reply) -> ComputeError {
        ComputeError::Coordination(format!("unexpected {:?} during {}", reply, phase))
    }

    /// Send the run parameters to every worker.
    pub(crate) fn broadcast(&self, params: BlurParams, weighting: Weighting) -> Result<(), ComputeError> {
        for worker in 0..self.plan.workers() {
            self.send(worker, Command::Broadcast { params, weighting })?;
        }
        self.collect(Phase::Broadcast, |reply| match reply {
            Reply::Ready { worker } => Ok(worker),
            other => Err(Self::unexpected(Phase::Broadcast, &other)),
        })
    }

    /// Distribute each worker's halo rows from the flat padded matrix.
    pub(crate) fn scatter(&self, padded: &PaddedMatrix) -> Result<(), ComputeError> {
        let table = self.plan.scatter_table();
        if padded.size() != table.width {
            return Err(ComputeError::Coordination(format!(
                "padded matrix is {} wide, plan expects {}",
                padded.size(),
                table.width
            )));
        }
        let flat = padded.as_array().as_slice().ok_or_else(|| {
            ComputeError::Coordination("padded matrix is not contiguous".into())
        })?;

        for block in self.plan.blocks() {
            let range = table
                .range(block.worker)
                .ok_or_else(|| ComputeError::Coordination(format!("no scatter entry for worker {}", block.worker)))?;
            if range.is_empty() {
                return Err(ComputeError::Coordination(format!(
                    "zero-length scatter to worker {}",
                    block.worker
                )));
            }
            if range.end > flat.len() {
                return Err(ComputeError::Coordination(format!(
                    "scatter to worker {} reads elements {}..{} of {}",
                    block.worker,
                    range.start,
                    range.end,
                    flat.len()
                )));
            }
            let rows = Array2::from_shape_vec((block.halo_row_count, table.width), flat[range].to_vec())
                .map_err(|e| ComputeError::Coordination(e.to_string()))?;
            log::debug!(
                "Scatter to worker {}: padded rows {:?}",
                block.worker,
                block.padded_rows()
            );
            self.send(block.worker, Command::Scatter { block: *block, rows })?;
        }

        self.collect(Phase::Scatter, |reply| match reply {
            Reply::Received { worker, elements } => {
                let expected = table.counts.get(worker).copied().unwrap_or(0);
                if elements != expected {
                    return Err(ComputeError::Coordination(format!(
                        "worker {} received {} elements, sent {}",
                        worker, elements, expected
                    )));
                }
                Ok(worker)
            }
            other => Err(Self::unexpected(Phase::Scatter, &other)),
        })
    }

    /// Release every worker into its kernel.
    pub(crate) fn compute(&self) -> Result<(), ComputeError> {
        for worker in 0..self.plan.workers() {
            self.send(worker, Command::Compute)?;
        }
        Ok(())
    }

    /// Collect one computed block from every worker.
    pub(crate) fn gather(&self) -> Result<Vec<GatheredBlock>, ComputeError> {
        let table = self.plan.gather_table();
        let mut blocks = Vec::with_capacity(self.plan.workers());
        self.collect(Phase::Gather, |reply| match reply {
            Reply::Gathered { worker, values } => {
                let expected = table.counts.get(worker).copied().unwrap_or(0);
                if values.len() != expected {
                    return Err(ComputeError::Coordination(format!(
                        "worker {} returned {} elements, expected {}",
                        worker,
                        values.len(),
                        expected
                    )));
                }
                blocks.push(GatheredBlock { worker, values });
                Ok(worker)
            }
            other => Err(Self::unexpected(Phase::Gather, &other)),
        })?;
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haloblur_core::{build_padded, plan};
    use std::sync::mpsc;

    /// A coordinator wired to hand-driven worker endpoints.
    fn wired(
        p: &PartitionPlan,
    ) -> (Coordinator<'_>, Vec<mpsc::Receiver<Command>>, mpsc::Sender<Reply>) {
        let (reply_tx, reply_rx) = mpsc::channel();
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..p.workers()).map(|_| mpsc::channel()).unzip();
        (Coordinator::new(p, senders, reply_rx).unwrap(), receivers, reply_tx)
    }

    #[test]
    fn test_scatter_sends_overlapping_halo_rows() {
        let p = plan(5, 2, 1).unwrap();
        let m = Array2::from_shape_fn((5, 5), |(r, c)| (r * 5 + c + 1) as i32);
        let padded = build_padded(&m, 1).unwrap();
        let (coordinator, receivers, replies) = wired(&p);

        replies.send(Reply::Received { worker: 0, elements: 5 * 7 }).unwrap();
        replies.send(Reply::Received { worker: 1, elements: 4 * 7 }).unwrap();
        coordinator.scatter(&padded).unwrap();

        let first = match receivers[0].recv().unwrap() {
            Command::Scatter { rows, .. } => rows,
            other => panic!("unexpected {:?}", other),
        };
        let second = match receivers[1].recv().unwrap() {
            Command::Scatter { block, rows } => {
                assert_eq!(block.start_row, 3);
                rows
            }
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(first.dim(), (5, 7));
        assert_eq!(second.dim(), (4, 7));
        // worker 1's top halo row is original row 2, owned by worker 0
        assert_eq!(second.row(0), padded.as_array().row(3));
        assert_eq!(first.row(4), second.row(1));
    }

    #[test]
    fn test_worker_failure_aborts_phase() {
        let p = plan(2, 2, 0).unwrap();
        let (coordinator, _receivers, replies) = wired(&p);
        replies
            .send(Reply::Failed { worker: 1, message: "boom".into() })
            .unwrap();
        let err = coordinator
            .broadcast(BlurParams::new(2, 0).unwrap(), Weighting::RingSum)
            .unwrap_err();
        assert!(matches!(err, ComputeError::WorkerFailed { worker: 1, .. }));
    }

    #[test]
    fn test_duplicate_reply_rejected() {
        let p = plan(2, 2, 0).unwrap();
        let (coordinator, _receivers, replies) = wired(&p);
        replies.send(Reply::Ready { worker: 0 }).unwrap();
        replies.send(Reply::Ready { worker: 0 }).unwrap();
        let err = coordinator
            .broadcast(BlurParams::new(2, 0).unwrap(), Weighting::RingSum)
            .unwrap_err();
        assert!(matches!(err, ComputeError::Coordination(_)));
    }

    #[test]
    fn test_short_gather_rejected() {
        let p = plan(3, 1, 0).unwrap();
        let (coordinator, _receivers, replies) = wired(&p);
        replies
            .send(Reply::Gathered { worker: 0, values: vec![0.0; 8] })
            .unwrap();
        assert!(matches!(coordinator.gather(), Err(ComputeError::Coordination(_))));
    }

    #[test]
    fn test_hung_up_workers_detected() {
        let p = plan(2, 1, 0).unwrap();
        let (coordinator, _receivers, replies) = wired(&p);
        drop(replies);
        assert!(matches!(coordinator.gather(), Err(ComputeError::Coordination(_))));
    }
}
