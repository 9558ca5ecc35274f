//! # Global runtime configuration.
//!
//! [`Config`] defines the engine's behavior: where container state lives on
//! disk, which backend runtime binary is the default, how long a start may
//! take, how many start workers run, and the sizing of the task queue and
//! event bus.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use containervisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.runtime = "runc".into();
//! cfg.start_timeout = Duration::from_secs(30);
//! cfg.start_workers = 4;
//!
//! assert_eq!(cfg.start_workers, 4);
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Global configuration for the supervision engine.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding one subdirectory per live container
    /// (runtime-managed files: bundle reference, init pid file, shim log).
    pub state_dir: PathBuf,
    /// Default runtime name used when a task carries no override.
    pub runtime: String,
    /// Extra arguments passed through to the runtime backend.
    pub runtime_args: Vec<String>,
    /// Maximum time the backend may take to start a container.
    pub start_timeout: Duration,
    /// Number of background start workers (minimum 1).
    pub start_workers: usize,
    /// Capacity of the task queue; producers block when it is full.
    pub queue_capacity: usize,
    /// Number of recent events retained for replay.
    pub event_history: usize,
    /// Capacity of each subscription's queue. Keep this at least as large
    /// as `event_history` so a full replay never trips the overflow policy.
    pub subscriber_capacity: usize,
    /// Render lifecycle events through `tracing` as they are published.
    pub log_events: bool,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `state_dir = /run/containervisor`
    /// - `runtime = "runc"`, no extra args
    /// - `start_timeout = 15s`
    /// - `start_workers = 10`
    /// - `queue_capacity = 2048`
    /// - `event_history = 2048`, `subscriber_capacity = 4096`
    /// - `log_events = false`
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/run/containervisor"),
            runtime: "runc".into(),
            runtime_args: Vec::new(),
            start_timeout: Duration::from_secs(15),
            start_workers: 10,
            queue_capacity: 2048,
            event_history: 2048,
            subscriber_capacity: 4096,
            log_events: false,
        }
    }
}
