//! Shared fixture: an in-memory runtime backend double and supervisor
//! bootstrap helpers.
//!
//! The double models just enough of a real backend for lifecycle tests:
//! - bundle paths ending in `fail-create` refuse to materialize,
//! - bundle paths ending in `fail-start` materialize but fail to start,
//! - bundle paths ending in `slow-start` park in `start` far longer than
//!   any test deadline,
//! - any signal kills a mock process with the shell-style `128 + signo`
//!   exit status,
//! - exits can also be injected directly via [`MockProcess::trigger_exit`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use tokio::sync::watch;

use containervisor::{
    AddProcess, Checkpoint, Config, Container, ContainerOpts, CreateContainer, Event, Process,
    ProcessSpec, Resources, Runtime, RuntimeError, State, Stdio, Subscription, Supervisor,
    SupervisorHandle, INIT_PROCESS_ID,
};

#[derive(Default)]
pub struct MockRuntime {
    containers: Mutex<HashMap<String, Arc<MockContainer>>>,
    pub created_opts: Mutex<Vec<ContainerOpts>>,
}

impl MockRuntime {
    pub fn container(&self, id: &str) -> Arc<MockContainer> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .expect("container was never created")
    }
}

#[async_trait]
impl Runtime for MockRuntime {
    async fn create(&self, opts: ContainerOpts) -> Result<Arc<dyn Container>, RuntimeError> {
        if opts.bundle.ends_with("fail-create") {
            return Err(RuntimeError::other("bundle refused"));
        }
        self.created_opts.lock().unwrap().push(opts.clone());

        let fail_start = opts.bundle.ends_with("fail-start");
        let slow_start = opts.bundle.ends_with("slow-start");
        let container = Arc::new(MockContainer {
            id: opts.id,
            bundle: opts.bundle,
            runtime: opts.runtime,
            labels: opts.labels,
            fail_start,
            slow_start,
            state: Mutex::new(State::Created),
            processes: Mutex::new(Vec::new()),
            resource_updates: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(4200),
        });
        self.containers
            .lock()
            .unwrap()
            .insert(container.id.clone(), Arc::clone(&container));
        Ok(container)
    }
}

pub struct MockContainer {
    id: String,
    bundle: PathBuf,
    runtime: String,
    labels: Vec<String>,
    fail_start: bool,
    slow_start: bool,
    state: Mutex<State>,
    processes: Mutex<Vec<Arc<MockProcess>>>,
    pub resource_updates: Mutex<Vec<Resources>>,
    next_pid: AtomicU32,
}

impl MockContainer {
    pub fn process(&self, id: &str) -> Arc<MockProcess> {
        self.processes
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .expect("process was never launched")
    }

    pub fn state_now(&self) -> State {
        *self.state.lock().unwrap()
    }

    fn launch(&self, id: &str, spec: ProcessSpec, stdio: Stdio) -> Arc<MockProcess> {
        let (exit, _) = watch::channel(None);
        let process = Arc::new(MockProcess {
            id: id.to_string(),
            pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
            spec,
            stdio,
            exit,
            stdin_closed: AtomicBool::new(false),
            resizes: Mutex::new(Vec::new()),
        });
        self.processes.lock().unwrap().push(Arc::clone(&process));
        process
    }
}

#[async_trait]
impl Container for MockContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn path(&self) -> &Path {
        &self.bundle
    }

    fn runtime(&self) -> &str {
        &self.runtime
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn state(&self) -> State {
        *self.state.lock().unwrap()
    }

    fn processes(&self) -> Vec<Arc<dyn Process>> {
        self.processes
            .lock()
            .unwrap()
            .iter()
            .map(|p| Arc::clone(p) as Arc<dyn Process>)
            .collect()
    }

    fn remove_process(&self, process_id: &str) {
        self.processes.lock().unwrap().retain(|p| p.id != process_id);
    }

    async fn start(
        &self,
        stdio: Stdio,
        _checkpoint: Option<Checkpoint>,
    ) -> Result<Arc<dyn Process>, RuntimeError> {
        if self.fail_start {
            return Err(RuntimeError::other("shim exec failed"));
        }
        if self.slow_start {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        *self.state.lock().unwrap() = State::Running;
        let spec = ProcessSpec {
            args: vec!["/sbin/init".into()],
            cwd: "/".into(),
            ..ProcessSpec::default()
        };
        Ok(self.launch(INIT_PROCESS_ID, spec, stdio))
    }

    async fn exec(
        &self,
        process_id: &str,
        spec: ProcessSpec,
        stdio: Stdio,
    ) -> Result<Arc<dyn Process>, RuntimeError> {
        if self.state() != State::Running {
            return Err(RuntimeError::other("container is not running"));
        }
        Ok(self.launch(process_id, spec, stdio))
    }

    async fn pause(&self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if *state != State::Running {
            return Err(RuntimeError::other("container is not running"));
        }
        *state = State::Paused;
        Ok(())
    }

    async fn resume(&self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if *state != State::Paused {
            return Err(RuntimeError::other("container is not paused"));
        }
        *state = State::Running;
        Ok(())
    }

    async fn update_resources(&self, resources: &Resources) -> Result<(), RuntimeError> {
        self.resource_updates.lock().unwrap().push(resources.clone());
        Ok(())
    }

    async fn pids(&self) -> Result<Vec<u32>, RuntimeError> {
        Ok(self.processes.lock().unwrap().iter().map(|p| p.pid).collect())
    }
}

pub struct MockProcess {
    id: String,
    pid: u32,
    spec: ProcessSpec,
    stdio: Stdio,
    exit: watch::Sender<Option<u32>>,
    stdin_closed: AtomicBool,
    pub resizes: Mutex<Vec<(u32, u32)>>,
}

impl MockProcess {
    pub fn trigger_exit(&self, status: u32) {
        let _ = self.exit.send(Some(status));
    }

    pub fn stdin_closed(&self) -> bool {
        self.stdin_closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Process for MockProcess {
    fn id(&self) -> &str {
        &self.id
    }

    fn system_pid(&self) -> u32 {
        self.pid
    }

    fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    fn stdio(&self) -> &Stdio {
        &self.stdio
    }

    async fn signal(&self, signal: Signal) -> Result<(), RuntimeError> {
        self.trigger_exit(128 + signal as i32 as u32);
        Ok(())
    }

    async fn close_stdin(&self) -> Result<(), RuntimeError> {
        self.stdin_closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn resize(&self, width: u32, height: u32) -> Result<(), RuntimeError> {
        self.resizes.lock().unwrap().push((width, height));
        Ok(())
    }

    async fn wait(&self) -> u32 {
        let mut rx = self.exit.subscribe();
        loop {
            if let Some(status) = *rx.borrow() {
                return status;
            }
            if rx.changed().await.is_err() {
                return 255;
            }
        }
    }
}

/// Boots a supervisor over a fresh mock backend. Returns the handle, the
/// backend for assertions, and the temp dir keeping the state directory
/// alive.
pub async fn start_supervisor() -> (SupervisorHandle, Arc<MockRuntime>, tempfile::TempDir) {
    let backend = Arc::new(MockRuntime::default());
    let tmp = tempfile::tempdir().expect("temp state dir");
    let cfg = Config {
        state_dir: tmp.path().join("state"),
        start_workers: 2,
        ..Config::default()
    };
    let supervisor =
        Supervisor::new(cfg, Arc::clone(&backend) as Arc<dyn Runtime>).expect("supervisor init");
    let handle = supervisor.handle();
    tokio::spawn(supervisor.run());
    (handle, backend, tmp)
}

pub fn create_request(id: &str, bundle: &str) -> CreateContainer {
    CreateContainer {
        id: id.to_string(),
        bundle_path: bundle.to_string(),
        stdout: format!("/tmp/{id}.out"),
        stderr: format!("/tmp/{id}.err"),
        ..CreateContainer::default()
    }
}

pub fn exec_request(container_id: &str, process_id: &str) -> AddProcess {
    AddProcess {
        container_id: container_id.to_string(),
        process_id: process_id.to_string(),
        args: vec!["/bin/cat".into()],
        cwd: "/".into(),
        ..AddProcess::default()
    }
}

/// Awaits the next event with a test-friendly deadline.
pub async fn next_event(sub: &mut Subscription) -> Event {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("subscription closed")
}
