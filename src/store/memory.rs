// src/store/memory.rs

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{merge_definition, Store, StoreFuture};
use crate::errors::SpeedwatchError;
use crate::types::{Schedule, TestResult};

#[derive(Debug, Default)]
struct MemoryState {
    schedules: BTreeMap<String, Schedule>,
    results: Vec<TestResult>,
}

/// In-process store. Clones share state.
///
/// `fail_writes` makes every write return a persistence error, which lets
/// tests exercise the scheduler's error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedules(schedules: impl IntoIterator<Item = Schedule>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for s in schedules {
                state.schedules.insert(s.id.clone(), s);
            }
        }
        store
    }

    pub fn schedule(&self, id: &str) -> Option<Schedule> {
        self.lock().schedules.get(id).cloned()
    }

    pub fn result_count(&self) -> usize {
        self.lock().results.len()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), SpeedwatchError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SpeedwatchError::Persistence(
                "memory store configured to fail writes".to_string(),
            ));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get_schedules(&self) -> StoreFuture<'_, Vec<Schedule>> {
        let schedules = self.lock().schedules.values().cloned().collect();
        Box::pin(async move { Ok(schedules) })
    }

    fn update_schedule(&self, schedule: Schedule) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check_writable()?;
            let mut state = self.lock();
            match state.schedules.get_mut(&schedule.id) {
                Some(slot) => {
                    *slot = schedule;
                    Ok(())
                }
                None => Err(SpeedwatchError::Persistence(format!(
                    "schedule '{}' not found",
                    schedule.id
                ))),
            }
        })
    }

    fn upsert_schedule(&self, schedule: Schedule) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check_writable()?;
            let mut state = self.lock();
            let merged = merge_definition(state.schedules.get(&schedule.id), schedule);
            state.schedules.insert(merged.id.clone(), merged);
            Ok(())
        })
    }

    fn save_result(&self, result: TestResult) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check_writable()?;
            self.lock().results.push(result);
            Ok(())
        })
    }

    fn results(&self) -> StoreFuture<'_, Vec<TestResult>> {
        let results = self.lock().results.clone();
        Box::pin(async move { Ok(results) })
    }
}
