// src/exec/mod.rs

//! Process supervision layer.
//!
//! This module owns the lifecycle of the external measurement tools:
//!
//! - [`supervisor`] spawns a tool with `tokio::process::Command`, streams
//!   its stdout line by line, and enforces deadline and cancellation.
//! - [`process_group`] holds the per-platform kill capability. Tools are
//!   isolated in their own process group on unix so that killing the group
//!   also reaches anything they forked.

pub mod process_group;
pub mod supervisor;

pub use process_group::ProcessGroup;
pub use supervisor::{ProcessSpec, SupervisedProcess};
