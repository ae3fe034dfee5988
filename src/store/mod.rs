// src/store/mod.rs

//! Persistence seam for schedules and results.
//!
//! The engine only needs a handful of operations, so they sit behind the
//! [`Store`] trait. [`memory::MemoryStore`] backs tests and one-off runs;
//! [`json_file::JsonFileStore`] keeps everything in a single JSON document
//! for the daemon.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::{Schedule, TestResult};

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait Store: Send + Sync {
    fn get_schedules(&self) -> StoreFuture<'_, Vec<Schedule>>;

    /// Overwrite an existing schedule (matched by id).
    fn update_schedule(&self, schedule: Schedule) -> StoreFuture<'_, ()>;

    /// Insert a schedule, or refresh the definition of an existing one while
    /// keeping its run bookkeeping. See [`merge_definition`].
    fn upsert_schedule(&self, schedule: Schedule) -> StoreFuture<'_, ()>;

    fn save_result(&self, result: TestResult) -> StoreFuture<'_, ()>;

    fn results(&self) -> StoreFuture<'_, Vec<TestResult>>;
}

/// Apply a new definition on top of a stored schedule.
///
/// Interval, servers, enabled flag and options come from `incoming`;
/// `next_run` and `last_run` stay as stored because only the scheduler
/// advances them.
pub fn merge_definition(existing: Option<&Schedule>, incoming: Schedule) -> Schedule {
    match existing {
        Some(old) => Schedule {
            next_run: old.next_run,
            last_run: old.last_run,
            ..incoming
        },
        None => incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::types::TestOptions;

    #[test]
    fn merge_keeps_bookkeeping() {
        let now = Utc::now();
        let stored = Schedule {
            id: "s".into(),
            server_ids: Default::default(),
            interval: "1h".into(),
            next_run: now + Duration::hours(1),
            last_run: Some(now),
            enabled: true,
            options: TestOptions::default(),
        };
        let incoming = Schedule {
            interval: "30m".into(),
            enabled: false,
            next_run: now,
            last_run: None,
            ..stored.clone()
        };

        let merged = merge_definition(Some(&stored), incoming.clone());
        assert_eq!(merged.interval, "30m");
        assert!(!merged.enabled);
        assert_eq!(merged.next_run, stored.next_run);
        assert_eq!(merged.last_run, stored.last_run);

        assert_eq!(merge_definition(None, incoming.clone()), incoming);
    }
}
