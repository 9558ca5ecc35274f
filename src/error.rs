//! # Error types surfaced by the supervision engine.
//!
//! This module defines [`SupervisorError`], the error every task completion
//! channel carries. Backend failures are wrapped verbatim as
//! [`SupervisorError::Runtime`]; see [`RuntimeError`](crate::RuntimeError)
//! for the backend side of the contract.
//!
//! The engine never aborts on a task-level error: each one is delivered to
//! the caller that submitted the task and the loop moves on. `as_label`
//! provides short stable names for logs and metrics.

use thiserror::Error;

use crate::runtime::RuntimeError;

/// Errors produced while executing supervisor tasks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Registry lookup miss.
    #[error("container '{id}' not found")]
    ContainerNotFound {
        /// The missing container id.
        id: String,
    },

    /// Process id absent in a known container.
    #[error("process '{process_id}' not found in container '{container_id}'")]
    ProcessNotFound {
        /// The container that was searched.
        container_id: String,
        /// The missing process id.
        process_id: String,
    },

    /// Requested state is not a transition the engine performs.
    #[error("unknown container status '{status}'")]
    UnknownContainerStatus {
        /// The rejected status string.
        status: String,
    },

    /// Task-level runtime override disagrees with the container's runtime.
    #[error("expected runtime '{expected}', got '{requested}'")]
    RuntimeMismatch {
        /// Runtime the container was created with.
        expected: String,
        /// Runtime the task asked for.
        requested: String,
    },

    /// Malformed request: empty id, empty bundle path, empty process id,
    /// bad signal number, duplicate container id.
    #[error("{reason}")]
    InvalidArgument {
        /// Human-readable rejection reason.
        reason: String,
    },

    /// Opaque pass-through from the runtime backend, including start
    /// timeouts.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A handler panicked; caught at the loop boundary.
    #[error("internal error: {reason}")]
    Internal {
        /// Best-effort panic payload.
        reason: String,
    },

    /// The supervisor loop is gone; no task can complete.
    #[error("supervisor task queue is closed")]
    QueueClosed,

    /// State directory could not be prepared during initialization.
    #[error("state directory: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::ContainerNotFound { .. } => "container_not_found",
            SupervisorError::ProcessNotFound { .. } => "process_not_found",
            SupervisorError::UnknownContainerStatus { .. } => "unknown_container_status",
            SupervisorError::RuntimeMismatch { .. } => "runtime_mismatch",
            SupervisorError::InvalidArgument { .. } => "invalid_argument",
            SupervisorError::Runtime(_) => "runtime_error",
            SupervisorError::Internal { .. } => "internal",
            SupervisorError::QueueClosed => "queue_closed",
            SupervisorError::Io(_) => "io",
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        SupervisorError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn container_not_found(id: impl Into<String>) -> Self {
        SupervisorError::ContainerNotFound { id: id.into() }
    }

    pub(crate) fn process_not_found(
        container_id: impl Into<String>,
        process_id: impl Into<String>,
    ) -> Self {
        SupervisorError::ProcessNotFound {
            container_id: container_id.into(),
            process_id: process_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_messages() {
        let err = SupervisorError::invalid_argument("empty bundle path");
        assert_eq!(err.to_string(), "empty bundle path");

        let err = SupervisorError::container_not_found("c1");
        assert_eq!(err.to_string(), "container 'c1' not found");

        let err = SupervisorError::RuntimeMismatch {
            expected: "runc".into(),
            requested: "other".into(),
        };
        assert_eq!(err.to_string(), "expected runtime 'runc', got 'other'");
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            SupervisorError::QueueClosed.as_label(),
            "queue_closed"
        );
        assert_eq!(
            SupervisorError::UnknownContainerStatus {
                status: "frozen".into()
            }
            .as_label(),
            "unknown_container_status"
        );
    }
}
