// src/engine/mod.rs

//! Scheduling engine for speedwatch.
//!
//! This module ties together:
//! - the pure due-check and reschedule rules ([`core`])
//! - the tick loop that fires due schedules ([`scheduler`])
//! - the service facade that runs a test and persists its results
//!   ([`service`])
//!
//! Time comes from a [`Clock`] so the rules can be tested without waiting.

pub mod clock;
pub mod core;
pub mod scheduler;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use scheduler::{Scheduler, SchedulerOptions};
pub use service::{SpeedTestService, TestExecutor};
