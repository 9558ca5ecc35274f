//! # Lifecycle events emitted by the supervisor.
//!
//! [`EventKind`] classifies the six externally visible lifecycle
//! transitions. [`Event`] carries the payload: container id, process id
//! (empty for container-level events), and the exit status (defined only
//! for [`EventKind::Exit`]).
//!
//! ## Ordering guarantees
//! `seq` and `timestamp` are assigned by the bus at publication: `seq` is a
//! strictly increasing counter and timestamps are clamped to be monotone
//! non-decreasing even if the wall clock steps backwards. Values set before
//! publication are placeholders.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A container's init process is up.
    StartContainer,
    /// An exec process is up.
    StartProcess,
    /// A monitored process exited.
    Exit,
    /// The kernel reported the container out-of-memory.
    Oom,
    /// The container was frozen.
    Pause,
    /// The container was thawed.
    Resume,
}

impl EventKind {
    /// Wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StartContainer => "start-container",
            EventKind::StartProcess => "start-process",
            EventKind::Exit => "exit",
            EventKind::Oom => "oom",
            EventKind::Pause => "pause",
            EventKind::Resume => "resume",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Bus-assigned, strictly increasing publication number.
    pub seq: u64,
    /// Bus-assigned wall-clock timestamp, monotone non-decreasing across
    /// publications.
    pub timestamp: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Container the event belongs to.
    pub id: String,
    /// Process the event belongs to; empty for container-level events.
    pub process_id: String,
    /// OS exit status; meaningful only for [`EventKind::Exit`].
    pub status: u32,
}

impl Event {
    /// Creates an event for `id`. `seq` and `timestamp` are finalized by
    /// the bus when the event is published.
    pub fn new(kind: EventKind, id: impl Into<String>) -> Self {
        Self {
            seq: 0,
            timestamp: SystemTime::now(),
            kind,
            id: id.into(),
            process_id: String::new(),
            status: 0,
        }
    }

    /// Attaches a process id.
    pub fn with_process(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = process_id.into();
        self
    }

    /// Attaches an exit status.
    pub fn with_status(mut self, status: u32) -> Self {
        self.status = status;
        self
    }

    /// Timestamp as whole seconds since the Unix epoch (the wire form).
    pub fn timestamp_secs(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
