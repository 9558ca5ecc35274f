//! # Start workers: the only home of long-running backend calls.
//!
//! `Container::start` can take seconds (shim spawn, init exec, checkpoint
//! restore). Running it in the loop would stall signal delivery and exit
//! handling behind every start, so the StartTask handler materializes the
//! container, then hands a [`StartRecord`] to a fixed worker pool. The
//! worker drives `start` to completion and re-enters the loop with a
//! StartComplete task carrying the outcome and the caller's response
//! channel.
//!
//! ## Rules
//! - Workers never touch the registry.
//! - The pool size is fixed at spawn; records queue when all workers are
//!   busy.
//! - Workers stop when the record channel closes or shutdown is signalled.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::runtime::{Checkpoint, Container, Stdio};
use crate::tasks::{StartCompleteTask, StartReply, Task};

/// One deferred start: everything a worker needs to finish the job and
/// report back.
pub(crate) struct StartRecord {
    pub container: Arc<dyn Container>,
    pub stdio: Stdio,
    pub checkpoint: Option<Checkpoint>,
    pub start_response: StartReply,
}

/// Spawns `count` workers sharing one record channel.
pub(crate) fn spawn_start_workers(
    count: usize,
    records: mpsc::UnboundedReceiver<StartRecord>,
    tasks: mpsc::Sender<Task>,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let records = Arc::new(Mutex::new(records));
    (0..count.max(1))
        .map(|worker| {
            let records = Arc::clone(&records);
            let tasks = tasks.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    // The receiver lock is held only while waiting for the
                    // next record, so idle workers queue up behind it.
                    let record = {
                        let mut rx = records.lock().await;
                        tokio::select! {
                            _ = shutdown.cancelled() => return,
                            record = rx.recv() => record,
                        }
                    };
                    let Some(record) = record else { return };

                    let container_id = record.container.id().to_string();
                    debug!(worker, container = %container_id, "driving container start");
                    let result = record
                        .container
                        .start(record.stdio, record.checkpoint)
                        .await;

                    let complete = Task::StartComplete {
                        task: StartCompleteTask {
                            container_id,
                            result,
                            start_response: record.start_response,
                        },
                    };
                    if tasks.send(complete).await.is_err() {
                        return;
                    }
                }
            })
        })
        .collect()
}
