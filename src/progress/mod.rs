// src/progress/mod.rs

//! Live progress fan-out for the single in-flight test.
//!
//! The runner publishes snapshots; any number of observers subscribe. Only
//! the newest snapshot is kept, so slow observers skip intermediate values
//! instead of stalling the runner.

pub mod broadcaster;

pub use broadcaster::{ProgressBroadcaster, ProgressSubscription};
