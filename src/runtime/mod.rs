//! Runtime backend seam: data types and capability traits.
//!
//! The engine never touches kernel primitives itself. Everything below the
//! registry — namespaces, cgroups, the shim, init processes — is behind the
//! [`Runtime`] / [`Container`] / [`Process`] traits. A production backend
//! wraps a runc-style binary; tests plug in a double.
//!
//! ## Contents
//! - [`Runtime`], [`Container`], [`Process`] — the capability contract
//! - [`RuntimeError`] — opaque backend failures, surfaced to callers verbatim
//! - [`State`], [`Stdio`], [`ProcessSpec`], [`Resources`], [`Checkpoint`],
//!   [`ContainerOpts`], [`Machine`] — the shared data model

mod adapter;
mod types;

pub use adapter::{Container, Process, Runtime, RuntimeError};
pub use types::{
    Checkpoint, ContainerOpts, Machine, ProcessSpec, Resources, State, Stdio, User,
    INIT_PROCESS_ID,
};
