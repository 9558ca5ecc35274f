//! Engine core: the serialized supervision loop and its satellites.
//!
//! ## Files & responsibilities
//! - **supervisor.rs**: public facade; owns the registry, queue, bus, and
//!   worker pool; dispatches tasks one at a time and publishes every event.
//! - **registry.rs**: the authoritative id → container map and snapshot
//!   building. Touched only from the loop; no lock, exclusivity is
//!   structural.
//! - **worker.rs**: fixed pool driving long-running `Container::start`
//!   calls off the loop; completions re-enter the queue.
//! - **monitor.rs**: process exit and OOM observation; a pure producer into
//!   the queue.
//! - **machine.rs**: host cpu/memory facts for the State operation.
//!
//! ## Who publishes & who mutates
//! - Only the loop publishes events and mutates the registry.
//! - Workers and the monitor only send tasks; they never see the registry.
//!
//! ## Ordering
//! Handler execution order equals queue dequeue order; events are published
//! in handler-production order; an init Exit event is published *before*
//! the registry entry disappears.

mod machine;
mod monitor;
mod registry;
mod supervisor;
mod worker;

pub use monitor::ProcessMonitor;
pub use registry::{ContainerSnapshot, ProcessSnapshot};
pub use supervisor::Supervisor;
