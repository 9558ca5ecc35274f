//! # containervisor
//!
//! **Containervisor** is the supervision core of a container daemon: a
//! single-consumer task engine that owns the authoritative map of containers
//! on a host, serializes every mutation to it, and multicasts lifecycle
//! events to subscribers with history replay.
//!
//! It deliberately does *not* talk to the kernel itself. Containers are
//! materialized by a pluggable [`Runtime`] backend (runc-style binaries,
//! shims, test doubles); the crate supervises whatever that backend hands
//! back.
//!
//! ## Features
//!
//! | Area              | Description                                                     | Key types / traits                         |
//! |-------------------|-----------------------------------------------------------------|--------------------------------------------|
//! | **Supervision**   | Serialized dispatch of lifecycle operations over one state map. | [`Supervisor`], [`SupervisorHandle`]       |
//! | **Events**        | Ordered lifecycle events, replayable, per-subscriber queues.    | [`Event`], [`EventKind`], [`Subscription`] |
//! | **Runtime seam**  | Capability contract a backend implements.                       | [`Runtime`], [`Container`], [`Process`]    |
//! | **Monitoring**    | Exit and OOM observation re-entering the engine as tasks.       | [`ProcessMonitor`]                         |
//! | **Errors**        | Typed errors for the engine and the backend.                    | [`SupervisorError`], [`RuntimeError`]      |
//! | **Configuration** | Centralized runtime settings.                                   | [`Config`]                                 |
//!
//! ## Architecture
//! ```text
//! RPC translator ──► SupervisorHandle ──► task queue ──► Supervisor loop
//!                                                          │ owns ContainerRegistry
//!                                                          │ calls Runtime backend
//!                                                          │ publishes to EventBus
//!                        start records ◄───────────────────┘
//!                              │
//!                       Start workers ──► StartComplete task ──► (back into the queue)
//!
//! ProcessMonitor: process.wait() ──► Exit task ──► (back into the queue)
//! ```
//!
//! ```no_run
//! use std::sync::Arc;
//! use containervisor::{Config, CreateContainer, Supervisor};
//!
//! # async fn demo(backend: Arc<dyn containervisor::Runtime>) -> Result<(), Box<dyn std::error::Error>> {
//! let supervisor = Supervisor::new(Config::default(), backend)?;
//! let handle = supervisor.handle();
//! tokio::spawn(supervisor.run());
//!
//! let container = handle
//!     .create_container(CreateContainer {
//!         id: "c1".into(),
//!         bundle_path: "/var/lib/bundles/c1".into(),
//!         ..CreateContainer::default()
//!     })
//!     .await?;
//! assert_eq!(container.status, "running");
//! # Ok(())
//! # }
//! ```

mod config;
mod core;
mod error;
mod events;
mod handle;
mod runtime;
mod tasks;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{ContainerSnapshot, ProcessMonitor, ProcessSnapshot, Supervisor};
pub use error::SupervisorError;
pub use events::{Event, EventBus, EventKind, Subscription};
pub use handle::{AddProcess, CreateContainer, StateSnapshot, SupervisorHandle};
pub use runtime::{
    Checkpoint, Container, ContainerOpts, Machine, Process, ProcessSpec, Resources, Runtime,
    RuntimeError, State, Stdio, User, INIT_PROCESS_ID,
};
