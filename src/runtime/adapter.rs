//! # Capability contract of the runtime backend.
//!
//! The engine requires exactly three capabilities from a backend:
//!
//! - [`Runtime`] — turn a bundle into a [`Container`] handle
//! - [`Container`] — drive one container: start, exec, pause, resume,
//!   resource updates, introspection
//! - [`Process`] — drive one process: signals, stdin, terminal size, exit
//!
//! ## Rules
//! - Backend errors are **opaque**: the engine wraps them unchanged and
//!   hands them to whichever caller submitted the task.
//! - `Container::start` must register the init process under
//!   [`INIT_PROCESS_ID`](crate::INIT_PROCESS_ID); every later lookup of the
//!   init process goes through that marker.
//! - `start` may take seconds (shim spawn, init exec). The engine only ever
//!   calls it from a background start worker, so implementations may block
//!   the calling task for the whole duration, bounded by
//!   [`ContainerOpts::timeout`].
//! - `Process::wait` is awaited exactly once per monitor registration and
//!   must resolve exactly once, with the OS exit status.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use thiserror::Error;

use super::types::{Checkpoint, ContainerOpts, ProcessSpec, Resources, State, Stdio};

/// Failures raised by the runtime backend.
///
/// The engine treats these as opaque: no variant changes its control flow
/// except that a failed start rolls the registry entry back.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The start sequence exceeded [`ContainerOpts::timeout`].
    #[error("container start timed out after {timeout:?}")]
    StartTimeout {
        /// The deadline that expired.
        timeout: Duration,
    },

    /// The backend does not implement an optional capability.
    #[error("operation '{op}' not supported by this runtime")]
    Unsupported {
        /// Name of the missing capability.
        op: &'static str,
    },

    /// Anything else the backend wants to report.
    #[error("{reason}")]
    Other {
        /// Backend-provided failure description.
        reason: String,
    },
}

impl RuntimeError {
    /// Wraps an arbitrary failure description.
    pub fn other(reason: impl Into<String>) -> Self {
        RuntimeError::Other {
            reason: reason.into(),
        }
    }
}

/// Factory capability: materializes containers from bundles.
#[async_trait]
pub trait Runtime: Send + Sync + 'static {
    /// Materializes a container from `opts` without starting it.
    ///
    /// On success the container is in [`State::Created`] and owns
    /// `<opts.root>/<opts.id>/` on disk.
    async fn create(&self, opts: ContainerOpts) -> Result<Arc<dyn Container>, RuntimeError>;
}

/// One managed container.
#[async_trait]
pub trait Container: Send + Sync + 'static {
    /// Caller-chosen container id.
    fn id(&self) -> &str;

    /// Bundle path the container was created from.
    fn path(&self) -> &Path;

    /// Runtime name the container was created with.
    fn runtime(&self) -> &str;

    /// Opaque user-supplied labels, in submission order.
    fn labels(&self) -> &[String];

    /// Current lifecycle state.
    fn state(&self) -> State;

    /// Live process handles, init first.
    fn processes(&self) -> Vec<Arc<dyn Process>>;

    /// Forgets a process entry after its exit has been delivered.
    fn remove_process(&self, process_id: &str);

    /// Launches the init process (or restores from `checkpoint`) and
    /// returns its handle, registered under
    /// [`INIT_PROCESS_ID`](crate::INIT_PROCESS_ID).
    async fn start(
        &self,
        stdio: Stdio,
        checkpoint: Option<Checkpoint>,
    ) -> Result<Arc<dyn Process>, RuntimeError>;

    /// Executes an additional process inside the running container.
    async fn exec(
        &self,
        process_id: &str,
        spec: ProcessSpec,
        stdio: Stdio,
    ) -> Result<Arc<dyn Process>, RuntimeError>;

    /// Freezes every process in the container.
    async fn pause(&self) -> Result<(), RuntimeError>;

    /// Thaws a paused container.
    async fn resume(&self) -> Result<(), RuntimeError>;

    /// Applies a sparse resource update; zero fields are left untouched.
    async fn update_resources(&self, resources: &Resources) -> Result<(), RuntimeError>;

    /// All live kernel pids inside the container.
    async fn pids(&self) -> Result<Vec<u32>, RuntimeError>;

    /// Writes a checkpoint. Optional capability.
    async fn checkpoint(&self, _checkpoint: &Checkpoint) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unsupported { op: "checkpoint" })
    }

    /// Restores from a named checkpoint in place. Optional capability; the
    /// common restore path is a start with [`ContainerOpts::checkpoint`]
    /// set.
    async fn restore(&self, _name: &str) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unsupported { op: "restore" })
    }
}

/// One process inside a container: the init process or an exec.
#[async_trait]
pub trait Process: Send + Sync + 'static {
    /// Caller-chosen process id; [`INIT_PROCESS_ID`](crate::INIT_PROCESS_ID)
    /// for the init process.
    fn id(&self) -> &str;

    /// Kernel pid, known once the process is running.
    fn system_pid(&self) -> u32;

    /// The specification the process was launched with.
    fn spec(&self) -> &ProcessSpec;

    /// Standard stream wiring.
    fn stdio(&self) -> &Stdio;

    /// Delivers an OS signal to the process.
    async fn signal(&self, signal: Signal) -> Result<(), RuntimeError>;

    /// Closes the process's stdin.
    async fn close_stdin(&self) -> Result<(), RuntimeError>;

    /// Resizes the process's terminal.
    async fn resize(&self, width: u32, height: u32) -> Result<(), RuntimeError>;

    /// Resolves with the OS exit status once the process has exited.
    async fn wait(&self) -> u32;
}
