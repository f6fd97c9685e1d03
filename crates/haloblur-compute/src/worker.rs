//! Worker side of the scatter/gather protocol.
//!
//! A worker answers exactly one broadcast and one scatter, waits for the
//! coordinator's go-ahead, runs the kernel over its halo block and returns
//! the owned rows. It never sees another worker's data.

use std::sync::mpsc::{Receiver, Sender};

use haloblur_core::Kernel;

use crate::backend::ComputeError;
use crate::channel::{Command, Reply};

/// Run one worker until its block is gathered or the coordinator hangs up.
pub(crate) fn run(worker: usize, commands: Receiver<Command>, replies: Sender<Reply>) {
    if let Err(e) = serve(worker, &commands, &replies) {
        log::debug!("Worker {} stopping: {}", worker, e);
        // The coordinator may already be gone; nothing else to report to.
        let _ = replies.send(Reply::Failed {
            worker,
            message: e.to_string(),
        });
    }
}

fn next(worker: usize, commands: &Receiver<Command>) -> Result<Command, ComputeError> {
    commands
        .recv()
        .map_err(|_| ComputeError::Coordination(format!("coordinator hung up on worker {}", worker)))
}

fn reply(replies: &Sender<Reply>, message: Reply) -> Result<(), ComputeError> {
    replies
        .send(message)
        .map_err(|_| ComputeError::Coordination("coordinator stopped listening".into()))
}

fn out_of_order(worker: usize, expected: &str, got: &Command) -> ComputeError {
    ComputeError::Coordination(format!(
        "worker {} expected {}, got {:?}",
        worker, expected, got
    ))
}

fn serve(worker: usize, commands: &Receiver<Command>, replies: &Sender<Reply>) -> Result<(), ComputeError> {
    let (params, weighting) = match next(worker, commands)? {
        Command::Broadcast { params, weighting } => (params, weighting),
        other => return Err(out_of_order(worker, "broadcast", &other)),
    };
    reply(replies, Reply::Ready { worker })?;

    let (block, rows) = match next(worker, commands)? {
        Command::Scatter { block, rows } => (block, rows),
        other => return Err(out_of_order(worker, "scatter", &other)),
    };
    if block.worker != worker {
        return Err(ComputeError::Coordination(format!(
            "worker {} was sent the block of worker {}",
            worker, block.worker
        )));
    }
    reply(replies, Reply::Received { worker, elements: rows.len() })?;

    match next(worker, commands)? {
        Command::Compute => {}
        other => return Err(out_of_order(worker, "compute", &other)),
    }

    let kernel = Kernel::new(params, weighting);
    let values = kernel.apply(&block, rows.view())?;
    log::debug!(
        "Worker {} computed rows {:?} ({} padded rows)",
        worker,
        block.rows(),
        block.halo_row_count
    );

    reply(
        replies,
        Reply::Gathered {
            worker,
            values: values.into_iter().collect(),
        },
    )
}
