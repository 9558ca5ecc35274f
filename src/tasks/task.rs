//! # Task variants and their completion channels.
//!
//! A [`Task`] pairs a payload with the one-shot channel(s) its submitter
//! awaits. Producers are the [`SupervisorHandle`](crate::SupervisorHandle),
//! the [`ProcessMonitor`](crate::ProcessMonitor), and start workers; the
//! supervisor loop is the single consumer.
//!
//! ## Completion protocol
//! - Most variants resolve one `reply` channel with `Result<()>` (or the
//!   snapshot list for [`GetContainersTask`]).
//! - [`StartTask`] is two-phase: `reply` resolves as soon as the container
//!   is materialized and queued for start ("deferred"); the final outcome,
//!   including the container snapshot, arrives on `start_response` via
//!   [`StartCompleteTask`].
//! - Internal variants ([`ExitTask`], [`OomTask`]) carry no reply.

use std::path::PathBuf;
use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::sync::oneshot;

use crate::core::ContainerSnapshot;
use crate::error::SupervisorError;
use crate::runtime::{Checkpoint, Process, ProcessSpec, Resources, RuntimeError, Stdio};

/// One-shot completion channel carried by a task.
pub(crate) type Reply<T = ()> = oneshot::Sender<Result<T, SupervisorError>>;

/// Channel carrying the final outcome of a deferred start.
pub(crate) type StartReply = oneshot::Sender<Result<ContainerSnapshot, SupervisorError>>;

/// Create and start a container.
pub(crate) struct StartTask {
    pub id: String,
    pub bundle: PathBuf,
    /// Runtime override; empty means the daemon default.
    pub runtime: String,
    pub stdio: Stdio,
    pub labels: Vec<String>,
    pub no_pivot_root: bool,
    pub checkpoint: Option<Checkpoint>,
}

/// Exec an additional process into a running container.
pub(crate) struct AddProcessTask {
    pub container_id: String,
    pub process_id: String,
    /// Runtime override; empty means the daemon default.
    pub runtime: String,
    pub spec: ProcessSpec,
    pub stdio: Stdio,
}

/// Deliver an OS signal to a process.
pub(crate) struct SignalTask {
    pub container_id: String,
    /// [`INIT_PROCESS_ID`](crate::INIT_PROCESS_ID) targets the init process.
    pub process_id: String,
    pub signal: Signal,
}

/// State transition and/or resource change. The transition applies first so
/// that a resource update against a freshly paused container is legal.
pub(crate) struct UpdateTask {
    pub container_id: String,
    /// Runtime override; empty means the daemon default.
    pub runtime: String,
    /// Requested status string; empty means no transition. Validated by the
    /// handler, after the container lookup.
    pub status: String,
    pub resources: Option<Resources>,
}

/// Terminal resize and/or stdin close for a process.
pub(crate) struct UpdateProcessTask {
    pub container_id: String,
    pub process_id: String,
    pub close_stdin: bool,
    pub width: u32,
    pub height: u32,
}

/// Read-only snapshot request. A by-id miss yields an empty list, not an
/// error; the caller distinguishes.
pub(crate) struct GetContainersTask {
    pub id: Option<String>,
    pub with_pids: bool,
}

/// Internal: a monitored process exited.
pub(crate) struct ExitTask {
    pub container_id: String,
    pub process_id: String,
    pub status: u32,
}

/// Internal: the kernel reported a container out-of-memory.
pub(crate) struct OomTask {
    pub container_id: String,
}

/// Internal: a start worker finished driving `Container::start`.
pub(crate) struct StartCompleteTask {
    pub container_id: String,
    pub result: Result<Arc<dyn Process>, RuntimeError>,
    pub start_response: StartReply,
}

/// The sum of work items the supervisor loop dispatches on.
pub(crate) enum Task {
    Start {
        task: StartTask,
        reply: Reply,
        start_response: StartReply,
    },
    AddProcess {
        task: AddProcessTask,
        reply: Reply,
    },
    Signal {
        task: SignalTask,
        reply: Reply,
    },
    Update {
        task: UpdateTask,
        reply: Reply,
    },
    UpdateProcess {
        task: UpdateProcessTask,
        reply: Reply,
    },
    GetContainers {
        task: GetContainersTask,
        reply: Reply<Vec<ContainerSnapshot>>,
    },
    Exit {
        task: ExitTask,
    },
    Oom {
        task: OomTask,
    },
    StartComplete {
        task: StartCompleteTask,
    },
}

impl Task {
    /// Short stable name for logs.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Task::Start { .. } => "start",
            Task::AddProcess { .. } => "add-process",
            Task::Signal { .. } => "signal",
            Task::Update { .. } => "update",
            Task::UpdateProcess { .. } => "update-process",
            Task::GetContainers { .. } => "get-containers",
            Task::Exit { .. } => "exit",
            Task::Oom { .. } => "oom",
            Task::StartComplete { .. } => "start-complete",
        }
    }
}
