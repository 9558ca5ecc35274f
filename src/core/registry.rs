//! # Container registry: the authoritative id → container map.
//!
//! [`ContainerRegistry`] is owned by the supervisor loop and touched from
//! no other thread of control; no lock guards it because exclusivity is
//! structural. Read-only consumers never see the map itself — they receive
//! [`ContainerSnapshot`]s built inside the loop, which later mutations do
//! not alter.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SupervisorError;
use crate::runtime::{Container, State, Stdio, User};

/// Registry entry for one live container.
pub(crate) struct ContainerInfo {
    pub container: Arc<dyn Container>,
}

/// Injective id → container map.
#[derive(Default)]
pub(crate) struct ContainerRegistry {
    containers: HashMap<String, ContainerInfo>,
}

impl ContainerRegistry {
    pub fn contains(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    pub fn insert(&mut self, info: ContainerInfo) {
        self.containers
            .insert(info.container.id().to_string(), info);
    }

    /// Lookup that surfaces a miss as [`SupervisorError::ContainerNotFound`].
    pub fn get(&self, id: &str) -> Result<&ContainerInfo, SupervisorError> {
        self.containers
            .get(id)
            .ok_or_else(|| SupervisorError::container_not_found(id))
    }

    /// Lookup for callers that treat a miss as data, not an error.
    pub fn find(&self, id: &str) -> Option<&ContainerInfo> {
        self.containers.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ContainerInfo> {
        self.containers.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerInfo> {
        self.containers.values()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }
}

/// Point-in-time view of one process, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: String,
    pub system_pid: u32,
    pub terminal: bool,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    pub user: User,
    pub stdio: Stdio,
}

/// Point-in-time view of one container, as returned to callers.
///
/// `pids` is populated only when the snapshot was requested with pids and
/// the container is running or paused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub id: String,
    pub bundle_path: String,
    pub processes: Vec<ProcessSnapshot>,
    pub labels: Vec<String>,
    pub status: String,
    pub pids: Vec<u32>,
    pub runtime: String,
}

/// Builds a deep snapshot of `container` inside the loop.
pub(crate) async fn snapshot(
    container: &Arc<dyn Container>,
    with_pids: bool,
) -> Result<ContainerSnapshot, SupervisorError> {
    let state = container.state();

    let mut processes = Vec::new();
    for process in container.processes() {
        let spec = process.spec();
        processes.push(ProcessSnapshot {
            id: process.id().to_string(),
            system_pid: process.system_pid(),
            terminal: spec.terminal,
            args: spec.args.clone(),
            env: spec.env.clone(),
            cwd: spec.cwd.clone(),
            user: spec.user.clone(),
            stdio: process.stdio().clone(),
        });
    }

    let pids = if with_pids && matches!(state, State::Running | State::Paused) {
        container.pids().await?
    } else {
        Vec::new()
    };

    Ok(ContainerSnapshot {
        id: container.id().to_string(),
        bundle_path: container.path().display().to_string(),
        processes,
        labels: container.labels().to_vec(),
        status: state.as_str().to_string(),
        pids,
        runtime: container.runtime().to_string(),
    })
}
