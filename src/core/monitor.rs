//! # Process monitor: exit and OOM observation.
//!
//! [`ProcessMonitor`] turns OS-level notifications into internal tasks. It
//! is a pure producer: it never reads or writes the registry, so the exit
//! path has the same serialization point as every other mutation — the
//! supervisor loop.
//!
//! Registration happens immediately after a process handle is obtained
//! (from start or exec); deregistration is implicit once the exit has been
//! delivered. Each registration produces exactly one Exit task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::runtime::Process;
use crate::tasks::{ExitTask, OomTask, Task};

/// Observer of process exits and OOM notifications.
///
/// Cheap to clone; a backend integration holds one to report OOM events
/// from whatever cgroup watcher it runs.
#[derive(Clone)]
pub struct ProcessMonitor {
    tasks: mpsc::Sender<Task>,
    shutdown: CancellationToken,
}

impl ProcessMonitor {
    pub(crate) fn new(tasks: mpsc::Sender<Task>, shutdown: CancellationToken) -> Self {
        Self { tasks, shutdown }
    }

    /// Watches `process` until it exits, then enqueues one Exit task.
    pub(crate) fn watch(&self, container_id: &str, process: Arc<dyn Process>) {
        let tasks = self.tasks.clone();
        let shutdown = self.shutdown.clone();
        let container_id = container_id.to_string();
        tokio::spawn(async move {
            let status = tokio::select! {
                _ = shutdown.cancelled() => return,
                status = process.wait() => status,
            };
            debug!(
                container = %container_id,
                process = %process.id(),
                status,
                "process exited"
            );
            let _ = tasks
                .send(Task::Exit {
                    task: ExitTask {
                        container_id,
                        process_id: process.id().to_string(),
                        status,
                    },
                })
                .await;
        });
    }

    /// Reports an out-of-memory notification for `container_id`.
    ///
    /// Callable from synchronous contexts; the enqueue happens on a
    /// detached task so a cgroup watcher thread is never blocked on the
    /// supervisor queue.
    pub fn notify_oom(&self, container_id: &str) {
        let tasks = self.tasks.clone();
        let task = Task::Oom {
            task: OomTask {
                container_id: container_id.to_string(),
            },
        };
        tokio::spawn(async move {
            let _ = tasks.send(task).await;
        });
    }
}
