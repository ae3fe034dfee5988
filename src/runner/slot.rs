// src/runner/slot.rs

//! The single system-wide "current test" slot.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::{Result, SpeedwatchError};

/// Capacity-1 slot shared by manual and scheduled runs.
///
/// Acquisition never waits: a caller that finds the slot taken gets
/// [`SpeedwatchError::AlreadyRunning`].
#[derive(Debug, Clone)]
pub struct ExecutionSlot {
    permits: Arc<Semaphore>,
}

/// Proof of slot ownership; the slot frees when this drops.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn try_acquire(&self) -> Result<SlotGuard> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .map(|permit| SlotGuard { _permit: permit })
            .map_err(|_| SpeedwatchError::AlreadyRunning)
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

impl Default for ExecutionSlot {
    fn default() -> Self {
        Self::new()
    }
}
