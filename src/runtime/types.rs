//! # Shared data model of the runtime seam.
//!
//! Plain data exchanged between the engine, the backend, and the RPC
//! translator. Everything here derives `serde` so the translator can marshal
//! it directly.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reserved process id of a container's init process.
///
/// The first process of a container is registered under this marker; its
/// exit terminates the container. Signal and resize requests that name it
/// are delivered to the init process.
pub const INIT_PROCESS_ID: &str = "init";

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Materialized but not yet started.
    Created,
    /// Init process is alive.
    Running,
    /// Frozen via the backend; processes exist but do not run.
    Paused,
    /// Init process has exited.
    Stopped,
}

impl State {
    /// Wire name of the state ("created", "running", "paused", "stopped").
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Created => "created",
            State::Running => "running",
            State::Paused => "paused",
            State::Stopped => "stopped",
        }
    }

    /// Parses a wire name. Returns `None` for anything outside the four
    /// state names.
    pub fn parse(s: &str) -> Option<State> {
        match s {
            "created" => Some(State::Created),
            "running" => Some(State::Running),
            "paused" => Some(State::Paused),
            "stopped" => Some(State::Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard stream wiring for a process: three path-or-fifo handles.
///
/// Empty strings mean "not wired"; the backend decides what that maps to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stdio {
    pub stdin: String,
    pub stdout: String,
    pub stderr: String,
}

impl Stdio {
    pub fn new(
        stdin: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            stdin: stdin.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// Credentials a process runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: u32,
    pub gid: u32,
    pub additional_gids: Vec<u32>,
}

/// Full specification of a process to run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub terminal: bool,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    pub user: User,
}

/// Sparse cgroup-style resource update. Zero / empty fields mean
/// "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_shares: u64,
    pub cpu_period: u64,
    pub cpu_quota: u64,
    pub cpuset_cpus: String,
    pub cpuset_mems: String,
    pub blkio_weight: u16,
    pub memory: u64,
    pub memory_reservation: u64,
    pub memory_swap: u64,
    pub kernel_memory: u64,
}

impl Resources {
    /// True when every field carries its "unchanged" value.
    pub fn is_unchanged(&self) -> bool {
        *self == Resources::default()
    }
}

/// Checkpoint descriptor: either the source a container is restored from at
/// start, or the target of a checkpoint operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    /// Leave the container stopped after checkpointing.
    pub exit: bool,
    /// Checkpoint established TCP connections.
    pub tcp: bool,
    /// Checkpoint unix domain sockets.
    pub unix_sockets: bool,
    /// Checkpoint shell jobs.
    pub shell: bool,
}

/// Everything the backend needs to materialize a container.
#[derive(Debug, Clone)]
pub struct ContainerOpts {
    /// Caller-chosen id, unique within the daemon.
    pub id: String,
    /// State directory root; the backend owns `<root>/<id>/`.
    pub root: PathBuf,
    /// Bundle directory: rootfs plus the runtime configuration document.
    pub bundle: PathBuf,
    /// Runtime name to launch with (already defaulted by the engine).
    pub runtime: String,
    /// Extra arguments for the runtime binary.
    pub runtime_args: Vec<String>,
    /// Opaque user-supplied labels.
    pub labels: Vec<String>,
    /// Skip pivot_root when entering the rootfs.
    pub no_pivot_root: bool,
    /// Deadline the backend must apply to the whole start sequence.
    pub timeout: Duration,
    /// Restore source, when the container starts from a checkpoint.
    pub checkpoint: Option<Checkpoint>,
}

/// Host facts reported by the State operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// Logical cpu count.
    pub cpus: u32,
    /// Total memory in bytes.
    pub memory: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_wire_names_round_trip() {
        for state in [State::Created, State::Running, State::Paused, State::Stopped] {
            assert_eq!(State::parse(state.as_str()), Some(state));
        }
        assert_eq!(State::parse("frozen"), None);
        assert_eq!(State::parse(""), None);
    }

    #[test]
    fn resources_default_is_unchanged() {
        assert!(Resources::default().is_unchanged());

        let update = Resources {
            memory: 64 << 20,
            ..Resources::default()
        };
        assert!(!update.is_unchanged());
    }
}
