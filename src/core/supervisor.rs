//! # Supervisor: the serialized dispatch loop.
//!
//! One tokio task owns the [`ContainerRegistry`] and consumes the task
//! queue; every mutation of container state happens here, in dequeue
//! order. Handlers call the backend synchronously — except container
//! start, which is deferred to the worker pool so a slow shim never stalls
//! signal delivery or exit handling.
//!
//! ## Dispatch flow
//! ```text
//! handle.create_container() ──► Start ──────► materialize, insert, defer to worker
//! (worker finishes)          ──► StartComplete ► monitor init, StartContainer event,
//!                                               resolve caller (or roll back on error)
//! handle.add_process()       ──► AddProcess ──► exec, monitor, StartProcess event
//! handle.signal()            ──► Signal ─────► deliver to process (init marker ok)
//! handle.update_container()  ──► Update ─────► pause/resume + events, then resources
//! handle.update_process()    ──► UpdateProcess ► close stdin / resize
//! handle.state()             ──► GetContainers ► deep snapshots
//! monitor (process died)     ──► Exit ───────► Exit event, then prune registry/process
//! monitor (cgroup watcher)   ──► Oom ────────► Oom event, no state change
//! ```
//!
//! ## Rules
//! - Events are published in handler-production order; for an init exit the
//!   Exit event is published **before** the registry entry is removed.
//! - A state change and a resource change in one Update task apply in that
//!   order.
//! - Handler panics are caught, logged, and surfaced as `Internal`; the
//!   loop keeps running. Loop-fatal conditions are limited to queue closure
//!   and state-directory I/O at init.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::machine;
use crate::core::monitor::ProcessMonitor;
use crate::core::registry::{snapshot, ContainerInfo, ContainerRegistry, ContainerSnapshot};
use crate::core::worker::{self, StartRecord};
use crate::error::SupervisorError;
use crate::events::{spawn_event_logger, Event, EventBus, EventKind};
use crate::handle::SupervisorHandle;
use crate::runtime::{ContainerOpts, Machine, Runtime, State, INIT_PROCESS_ID};
use crate::tasks::{
    AddProcessTask, ExitTask, GetContainersTask, OomTask, SignalTask, StartCompleteTask, StartReply,
    StartTask, Task, UpdateProcessTask, UpdateTask,
};

/// Owner of the container map and the single consumer of the task queue.
///
/// Construct with [`Supervisor::new`], grab as many [`SupervisorHandle`]s
/// as needed, then drive the engine with [`Supervisor::run`].
pub struct Supervisor {
    core: Core,
    machine: Machine,
    tasks_tx: mpsc::Sender<Task>,
    tasks_rx: mpsc::Receiver<Task>,
    records_rx: mpsc::UnboundedReceiver<StartRecord>,
}

impl Supervisor {
    /// Initializes the engine: prepares the state directory (fatal on I/O
    /// failure), collects machine facts, and opens the bus and queues.
    /// Nothing runs until [`Supervisor::run`].
    pub fn new(cfg: Config, backend: Arc<dyn Runtime>) -> Result<Self, SupervisorError> {
        std::fs::create_dir_all(&cfg.state_dir)?;

        let machine = machine::collect();
        let bus = EventBus::new(cfg.event_history, cfg.subscriber_capacity);
        let (tasks_tx, tasks_rx) = mpsc::channel(cfg.queue_capacity.max(1));
        // The worker hand-off is unbounded: the loop may only ever block on
        // the task queue, never on start backpressure.
        let (records_tx, records_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let monitor = ProcessMonitor::new(tasks_tx.clone(), shutdown.clone());

        info!(
            state_dir = %cfg.state_dir.display(),
            runtime = %cfg.runtime,
            cpus = machine.cpus,
            "supervisor initialized"
        );

        Ok(Self {
            core: Core {
                cfg,
                backend,
                registry: ContainerRegistry::default(),
                bus,
                records_tx,
                monitor,
                shutdown,
            },
            machine,
            tasks_tx,
            tasks_rx,
            records_rx,
        })
    }

    /// Returns a cloneable handle for submitting operations and consuming
    /// events. Handles stay valid for the lifetime of the loop.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle::new(
            self.tasks_tx.clone(),
            self.core.bus.clone(),
            self.machine,
            self.core.monitor.clone(),
            self.core.shutdown.clone(),
        )
    }

    /// Runs the dispatch loop until shutdown is signalled (or the queue
    /// closes). Consumes the supervisor; spawn it as its own task.
    pub async fn run(self) {
        let Supervisor {
            mut core,
            machine: _,
            tasks_tx,
            mut tasks_rx,
            records_rx,
        } = self;

        let workers = worker::spawn_start_workers(
            core.cfg.start_workers,
            records_rx,
            tasks_tx.clone(),
            core.shutdown.clone(),
        );
        drop(tasks_tx);
        let logger = core
            .cfg
            .log_events
            .then(|| spawn_event_logger(&core.bus, core.shutdown.clone()));

        info!(workers = core.cfg.start_workers.max(1), "supervisor loop running");
        loop {
            let task = tokio::select! {
                _ = core.shutdown.cancelled() => break,
                task = tasks_rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };
            core.dispatch(task).await;
        }

        // Unblock any worker parked on the queue, then reap everything.
        core.shutdown.cancel();
        drop(tasks_rx);
        for worker in workers {
            let _ = worker.await;
        }
        if let Some(logger) = logger {
            let _ = logger.await;
        }
        info!(containers = core.registry.len(), "supervisor loop stopped");
    }
}

/// Loop-private state: everything handlers touch.
struct Core {
    cfg: Config,
    backend: Arc<dyn Runtime>,
    registry: ContainerRegistry,
    bus: EventBus,
    records_tx: mpsc::UnboundedSender<StartRecord>,
    monitor: ProcessMonitor,
    shutdown: CancellationToken,
}

impl Core {
    async fn dispatch(&mut self, task: Task) {
        debug!(task = task.kind(), "dispatching");
        match task {
            Task::Start {
                task,
                reply,
                start_response,
            } => {
                let res = guarded(self.start(task, start_response)).await;
                warn_on_error("start", &res);
                let _ = reply.send(res);
            }
            Task::AddProcess { task, reply } => {
                let res = guarded(self.add_process(task)).await;
                warn_on_error("add-process", &res);
                let _ = reply.send(res);
            }
            Task::Signal { task, reply } => {
                let res = guarded(self.signal(task)).await;
                warn_on_error("signal", &res);
                let _ = reply.send(res);
            }
            Task::Update { task, reply } => {
                let res = guarded(self.update(task)).await;
                warn_on_error("update", &res);
                let _ = reply.send(res);
            }
            Task::UpdateProcess { task, reply } => {
                let res = guarded(self.update_process(task)).await;
                warn_on_error("update-process", &res);
                let _ = reply.send(res);
            }
            Task::GetContainers { task, reply } => {
                let res = guarded(self.get_containers(task)).await;
                warn_on_error("get-containers", &res);
                let _ = reply.send(res);
            }
            Task::Exit { task } => {
                let res = guarded(self.exit(task)).await;
                warn_on_error("exit", &res);
            }
            Task::Oom { task } => self.oom(task),
            Task::StartComplete { task } => {
                let res = guarded(self.start_complete(task)).await;
                warn_on_error("start-complete", &res);
            }
        }
    }

    /// Phase one of a deferred start: materialize the container, insert it,
    /// and hand the long-running `start` call to the worker pool. The final
    /// outcome reaches the caller through `start_response`.
    async fn start(
        &mut self,
        t: StartTask,
        start_response: StartReply,
    ) -> Result<(), SupervisorError> {
        if self.registry.contains(&t.id) {
            return Err(SupervisorError::invalid_argument(format!(
                "container '{}' already exists",
                t.id
            )));
        }

        let runtime = self.runtime_or_default(t.runtime);
        let opts = ContainerOpts {
            id: t.id.clone(),
            root: self.cfg.state_dir.clone(),
            bundle: t.bundle,
            runtime,
            runtime_args: self.cfg.runtime_args.clone(),
            labels: t.labels,
            no_pivot_root: t.no_pivot_root,
            timeout: self.cfg.start_timeout,
            checkpoint: t.checkpoint.clone(),
        };
        let container = self.backend.create(opts).await?;
        self.registry.insert(ContainerInfo {
            container: Arc::clone(&container),
        });

        let record = StartRecord {
            container,
            stdio: t.stdio,
            checkpoint: t.checkpoint,
            start_response,
        };
        if self.records_tx.send(record).is_err() {
            self.registry.remove(&t.id);
            return Err(SupervisorError::QueueClosed);
        }
        Ok(())
    }

    /// Phase two, re-entering from a worker: wire up monitoring, publish
    /// StartContainer, and resolve the caller — or roll the registry entry
    /// back if the backend failed.
    async fn start_complete(&mut self, t: StartCompleteTask) -> Result<(), SupervisorError> {
        let StartCompleteTask {
            container_id,
            result,
            start_response,
        } = t;

        match result {
            Ok(process) => {
                self.monitor.watch(&container_id, process);
                self.bus
                    .publish(Event::new(EventKind::StartContainer, &container_id));
                let snap = match self.registry.get(&container_id) {
                    Ok(info) => snapshot(&info.container, false).await,
                    Err(err) => Err(err),
                };
                let _ = start_response.send(snap);
            }
            Err(err) => {
                warn!(container = %container_id, error = %err, "container start failed");
                self.registry.remove(&container_id);
                let _ = start_response.send(Err(SupervisorError::Runtime(err)));
            }
        }
        Ok(())
    }

    async fn add_process(&mut self, t: AddProcessTask) -> Result<(), SupervisorError> {
        let runtime = self.runtime_or_default(t.runtime);
        let info = self.registry.get(&t.container_id)?;

        // Execs must run with the runtime the container was started with.
        if info.container.runtime() != runtime {
            return Err(SupervisorError::RuntimeMismatch {
                expected: info.container.runtime().to_string(),
                requested: runtime,
            });
        }

        let process = info.container.exec(&t.process_id, t.spec, t.stdio).await?;
        self.monitor.watch(&t.container_id, process);
        self.bus.publish(
            Event::new(EventKind::StartProcess, &t.container_id).with_process(&t.process_id),
        );
        Ok(())
    }

    async fn signal(&mut self, t: SignalTask) -> Result<(), SupervisorError> {
        let info = self.registry.get(&t.container_id)?;
        let process = info
            .container
            .processes()
            .into_iter()
            .find(|p| p.id() == t.process_id)
            .ok_or_else(|| {
                SupervisorError::process_not_found(&t.container_id, &t.process_id)
            })?;
        process.signal(t.signal).await?;
        Ok(())
    }

    async fn update(&mut self, t: UpdateTask) -> Result<(), SupervisorError> {
        let runtime = self.runtime_or_default(t.runtime);
        let info = self.registry.get(&t.container_id)?;

        if info.container.runtime() != runtime {
            return Err(SupervisorError::RuntimeMismatch {
                expected: info.container.runtime().to_string(),
                requested: runtime,
            });
        }

        // State first: a resource update against the freshly paused
        // container must be legal. The status string is validated here, not
        // at submission, so a missing container wins over a bad status.
        if !t.status.is_empty() {
            match State::parse(&t.status) {
                Some(State::Paused) => {
                    info.container.pause().await?;
                    self.bus
                        .publish(Event::new(EventKind::Pause, &t.container_id));
                }
                Some(State::Running) => {
                    info.container.resume().await?;
                    self.bus
                        .publish(Event::new(EventKind::Resume, &t.container_id));
                }
                _ => {
                    return Err(SupervisorError::UnknownContainerStatus {
                        status: t.status.clone(),
                    })
                }
            }
        }

        if let Some(resources) = &t.resources {
            if !resources.is_unchanged() {
                info.container.update_resources(resources).await?;
            }
        }
        Ok(())
    }

    async fn update_process(&mut self, t: UpdateProcessTask) -> Result<(), SupervisorError> {
        let info = self.registry.get(&t.container_id)?;
        let process = info
            .container
            .processes()
            .into_iter()
            .find(|p| p.id() == t.process_id)
            .ok_or_else(|| {
                SupervisorError::process_not_found(&t.container_id, &t.process_id)
            })?;

        if t.close_stdin {
            process.close_stdin().await?;
        }
        if t.width > 0 || t.height > 0 {
            process.resize(t.width, t.height).await?;
        }
        Ok(())
    }

    async fn get_containers(
        &mut self,
        t: GetContainersTask,
    ) -> Result<Vec<ContainerSnapshot>, SupervisorError> {
        let mut out = Vec::new();
        match &t.id {
            Some(id) => {
                if let Some(info) = self.registry.find(id) {
                    out.push(snapshot(&info.container, t.with_pids).await?);
                }
            }
            None => {
                for info in self.registry.iter() {
                    out.push(snapshot(&info.container, t.with_pids).await?);
                }
                out.sort_by(|a, b| a.id.cmp(&b.id));
            }
        }
        Ok(out)
    }

    /// Exit events are published before the registry mutation so a
    /// GetContainers queued behind this task still observes consistent
    /// state: the entry is gone only once the event is observable.
    async fn exit(&mut self, t: ExitTask) -> Result<(), SupervisorError> {
        if self.registry.find(&t.container_id).is_none() {
            debug!(
                container = %t.container_id,
                process = %t.process_id,
                "exit for unknown container"
            );
            return Ok(());
        }

        self.bus.publish(
            Event::new(EventKind::Exit, &t.container_id)
                .with_process(&t.process_id)
                .with_status(t.status),
        );

        if t.process_id == INIT_PROCESS_ID {
            self.registry.remove(&t.container_id);
            debug!(container = %t.container_id, status = t.status, "container stopped");
        } else if let Some(info) = self.registry.find(&t.container_id) {
            info.container.remove_process(&t.process_id);
        }
        Ok(())
    }

    /// OOM does not change state; a subsequent Exit typically follows.
    fn oom(&mut self, t: OomTask) {
        self.bus.publish(Event::new(EventKind::Oom, &t.container_id));
    }

    fn runtime_or_default(&self, runtime: String) -> String {
        if runtime.is_empty() {
            self.cfg.runtime.clone()
        } else {
            runtime
        }
    }
}

/// Runs a handler future with a panic boundary: a panicking backend is
/// logged and reported as `Internal` instead of tearing the loop down.
async fn guarded<T, F>(fut: F) -> Result<T, SupervisorError>
where
    F: std::future::Future<Output = Result<T, SupervisorError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => {
            let reason = panic_reason(panic.as_ref());
            error!(reason = %reason, "handler panicked");
            Err(SupervisorError::Internal { reason })
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn warn_on_error<T>(kind: &'static str, res: &Result<T, SupervisorError>) {
    if let Err(err) = res {
        warn!(task = kind, error = %err, label = err.as_label(), "task failed");
    }
}
