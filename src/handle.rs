//! # Service surface: the handle an RPC translator drives.
//!
//! [`SupervisorHandle`] maps each external operation 1:1 onto a task
//! variant: it validates the request, enqueues the task (blocking when the
//! queue is full), and awaits the completion channel. All marshalling
//! concerns live here; the loop only ever sees well-formed payloads.
//!
//! Handles are cheap to clone and remain valid for the lifetime of the
//! loop; once the loop is gone every operation resolves to
//! [`SupervisorError::QueueClosed`].

use std::time::{Duration, UNIX_EPOCH};

use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::{ContainerSnapshot, ProcessMonitor};
use crate::error::SupervisorError;
use crate::events::{EventBus, Subscription};
use crate::runtime::{Checkpoint, Machine, ProcessSpec, Resources, Stdio, User};
use crate::tasks::{
    AddProcessTask, GetContainersTask, SignalTask, StartTask, Task, UpdateProcessTask, UpdateTask,
};

/// CreateContainer request: create a container from a bundle and start its
/// init process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateContainer {
    /// Caller-chosen container id.
    pub id: String,
    /// Bundle directory; must be non-empty.
    pub bundle_path: String,
    pub stdin: String,
    pub stdout: String,
    pub stderr: String,
    /// Opaque user-supplied labels.
    pub labels: Vec<String>,
    pub no_pivot_root: bool,
    /// Runtime override; empty means the daemon default.
    pub runtime: String,
    /// Restore from this checkpoint instead of a cold start.
    pub checkpoint: Option<Checkpoint>,
}

/// AddProcess request: exec an additional process into a running container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddProcess {
    pub container_id: String,
    /// Caller-chosen process id, unique within the container.
    pub process_id: String,
    pub terminal: bool,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    pub user: User,
    pub stdin: String,
    pub stdout: String,
    pub stderr: String,
    /// Runtime override; empty means the daemon default.
    pub runtime: String,
}

/// Response of the State operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub machine: Machine,
    pub containers: Vec<ContainerSnapshot>,
}

/// Cloneable front door to the supervisor loop.
#[derive(Clone)]
pub struct SupervisorHandle {
    tasks: mpsc::Sender<Task>,
    bus: EventBus,
    machine: Machine,
    monitor: ProcessMonitor,
    shutdown: CancellationToken,
}

impl SupervisorHandle {
    pub(crate) fn new(
        tasks: mpsc::Sender<Task>,
        bus: EventBus,
        machine: Machine,
        monitor: ProcessMonitor,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tasks,
            bus,
            machine,
            monitor,
            shutdown,
        }
    }

    /// Creates and starts a container; resolves once the init process is up
    /// with a snapshot of the new container (without pids).
    pub async fn create_container(
        &self,
        req: CreateContainer,
    ) -> Result<ContainerSnapshot, SupervisorError> {
        if req.id.is_empty() {
            return Err(SupervisorError::invalid_argument(
                "container id cannot be empty",
            ));
        }
        if req.bundle_path.is_empty() {
            return Err(SupervisorError::invalid_argument("empty bundle path"));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let (start_tx, start_rx) = oneshot::channel();
        self.submit(Task::Start {
            task: StartTask {
                id: req.id,
                bundle: req.bundle_path.into(),
                runtime: req.runtime,
                stdio: Stdio::new(req.stdin, req.stdout, req.stderr),
                labels: req.labels,
                no_pivot_root: req.no_pivot_root,
                checkpoint: req.checkpoint,
            },
            reply: reply_tx,
            start_response: start_tx,
        })
        .await?;

        // Two-phase: first the accept ("deferred"), then the start outcome.
        recv(reply_rx).await??;
        recv(start_rx).await?
    }

    /// Execs a new process into an existing container.
    pub async fn add_process(&self, req: AddProcess) -> Result<(), SupervisorError> {
        if req.container_id.is_empty() {
            return Err(SupervisorError::invalid_argument(
                "container id cannot be empty",
            ));
        }
        if req.process_id.is_empty() {
            return Err(SupervisorError::invalid_argument(
                "process id cannot be empty",
            ));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Task::AddProcess {
            task: AddProcessTask {
                container_id: req.container_id,
                process_id: req.process_id,
                runtime: req.runtime,
                spec: ProcessSpec {
                    terminal: req.terminal,
                    args: req.args,
                    env: req.env,
                    cwd: req.cwd,
                    user: req.user,
                },
                stdio: Stdio::new(req.stdin, req.stdout, req.stderr),
            },
            reply: reply_tx,
        })
        .await?;
        recv(reply_rx).await?
    }

    /// Delivers an OS signal to a process.
    /// `process_id == `[`INIT_PROCESS_ID`](crate::INIT_PROCESS_ID) targets
    /// the init process.
    pub async fn signal(
        &self,
        container_id: &str,
        process_id: &str,
        signal: u32,
    ) -> Result<(), SupervisorError> {
        if container_id.is_empty() {
            return Err(SupervisorError::invalid_argument(
                "container id cannot be empty",
            ));
        }
        let signal = Signal::try_from(signal as i32).map_err(|_| {
            SupervisorError::invalid_argument(format!("invalid signal number {signal}"))
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Task::Signal {
            task: SignalTask {
                container_id: container_id.to_string(),
                process_id: process_id.to_string(),
                signal,
            },
            reply: reply_tx,
        })
        .await?;
        recv(reply_rx).await?
    }

    /// Applies a state transition ("paused" / "running") and/or a sparse
    /// resource update; the transition applies first.
    pub async fn update_container(
        &self,
        container_id: &str,
        status: Option<&str>,
        resources: Option<Resources>,
    ) -> Result<(), SupervisorError> {
        if container_id.is_empty() {
            return Err(SupervisorError::invalid_argument(
                "container id cannot be empty",
            ));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Task::Update {
            task: UpdateTask {
                container_id: container_id.to_string(),
                runtime: String::new(),
                status: status.unwrap_or_default().to_string(),
                resources,
            },
            reply: reply_tx,
        })
        .await?;
        recv(reply_rx).await?
    }

    /// Closes a process's stdin and/or resizes its terminal. Zero width and
    /// zero height mean no resize.
    pub async fn update_process(
        &self,
        container_id: &str,
        process_id: &str,
        close_stdin: bool,
        width: u32,
        height: u32,
    ) -> Result<(), SupervisorError> {
        if container_id.is_empty() {
            return Err(SupervisorError::invalid_argument(
                "container id cannot be empty",
            ));
        }
        if process_id.is_empty() {
            return Err(SupervisorError::invalid_argument(
                "process id cannot be empty",
            ));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Task::UpdateProcess {
            task: UpdateProcessTask {
                container_id: container_id.to_string(),
                process_id: process_id.to_string(),
                close_stdin,
                width,
                height,
            },
            reply: reply_tx,
        })
        .await?;
        recv(reply_rx).await?
    }

    /// Machine facts plus container snapshots (with pids for running and
    /// paused containers). `None` or an empty id returns all containers; an
    /// unknown id returns an empty list.
    pub async fn state(&self, id: Option<&str>) -> Result<StateSnapshot, SupervisorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Task::GetContainers {
            task: GetContainersTask {
                id: id.filter(|s| !s.is_empty()).map(String::from),
                with_pids: true,
            },
            reply: reply_tx,
        })
        .await?;
        let containers = recv(reply_rx).await??;
        Ok(StateSnapshot {
            machine: self.machine,
            containers,
        })
    }

    /// Subscribes to lifecycle events. `since_unix_secs == 0` means future
    /// events only; a non-zero value replays retained events from that Unix
    /// time forward before any new event.
    pub fn events(&self, since_unix_secs: u64) -> Subscription {
        let since =
            (since_unix_secs > 0).then(|| UNIX_EPOCH + Duration::from_secs(since_unix_secs));
        self.bus.subscribe(since)
    }

    /// Host facts collected at initialization.
    pub fn machine(&self) -> Machine {
        self.machine
    }

    /// The exit/OOM observer, for backend integrations that run their own
    /// cgroup watchers.
    pub fn monitor(&self) -> ProcessMonitor {
        self.monitor.clone()
    }

    /// Stops the loop, the workers, and every monitor watcher.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl SupervisorHandle {
    async fn submit(&self, task: Task) -> Result<(), SupervisorError> {
        self.tasks
            .send(task)
            .await
            .map_err(|_| SupervisorError::QueueClosed)
    }
}

/// Awaits a completion channel; a dropped sender means the loop is gone.
async fn recv<T>(rx: oneshot::Receiver<T>) -> Result<T, SupervisorError> {
    rx.await.map_err(|_| SupervisorError::QueueClosed)
}
