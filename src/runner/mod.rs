// src/runner/mod.rs

//! Test execution.
//!
//! - [`backend`] validates [`TestOptions`](crate::types::TestOptions),
//!   picks one backend and plans the processes to run.
//! - [`parse`] turns each tool's stdout into samples and a final
//!   measurement.
//! - [`tracker`] keeps the run's phase monotonic and throttles pushes.
//! - [`slot`] is the single execution slot shared by every caller.
//! - [`test_runner`] ties them together around the process supervisor.

pub mod backend;
pub mod parse;
pub mod slot;
pub mod test_runner;
pub mod tracker;

pub use backend::{select_backend, RunnerSettings};
pub use slot::ExecutionSlot;
pub use test_runner::TestRunner;
pub use tracker::{ProgressThrottle, ProgressTracker};
