//! Work items submitted to the supervisor loop.
//!
//! Every operation the engine performs — external (create, exec, signal,
//! update, snapshot) and internal (exit, OOM, start completion) — travels
//! through one bounded queue as a [`Task`] variant. The loop is the only
//! consumer; see `core/supervisor.rs` for dispatch.

mod task;

pub(crate) use task::{
    AddProcessTask, ExitTask, GetContainersTask, OomTask, SignalTask, StartCompleteTask,
    StartReply, StartTask, Task, UpdateProcessTask, UpdateTask,
};
